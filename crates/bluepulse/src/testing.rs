//! Recording radios for unit tests

use crate::gap::{AdvertisementData, DiscoveredPeer, PeerId};
use crate::gatt::{GattService, ServiceDescriptor, SessionId, SubscriberId};
use crate::radio::{CentralRadio, PeripheralRadio};
use crate::uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralCall {
    AddService(Uuid),
    StartAdvertising(Vec<u8>),
    StopAdvertising,
    Notify(SubscriberId, Vec<u8>),
}

/// Accepts every request and records it. Notifications to the subscribers
/// in `unreachable` fail.
#[derive(Debug, Default)]
pub struct MockPeripheralRadio {
    pub calls: Vec<PeripheralCall>,
    pub unreachable: Vec<SubscriberId>,
}

impl MockPeripheralRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications_to(&self, id: &SubscriberId) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PeripheralCall::Notify(to, value) if to == id => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &PeripheralCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl PeripheralRadio for MockPeripheralRadio {
    fn add_service(&mut self, service: &GattService) -> Result<(), String> {
        self.calls.push(PeripheralCall::AddService(service.uuid));
        Ok(())
    }

    fn start_advertising(&mut self, payload: &[u8]) -> Result<(), String> {
        self.calls.push(PeripheralCall::StartAdvertising(payload.to_vec()));
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.calls.push(PeripheralCall::StopAdvertising);
    }

    fn notify(&mut self, subscriber: &SubscriberId, _characteristic: &Uuid, value: &[u8]) -> Result<(), String> {
        if self.unreachable.contains(subscriber) {
            return Err("link lost".to_string());
        }
        self.calls.push(PeripheralCall::Notify(*subscriber, value.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralCall {
    StartScan(Vec<Uuid>),
    StopScan,
    Connect(PeerId, SessionId),
    Cancel(PeerId, SessionId),
    DiscoverServices(SessionId),
    DiscoverCharacteristics(SessionId),
    SetNotify(SessionId, bool),
}

#[derive(Debug, Default)]
pub struct MockCentralRadio {
    pub calls: Vec<CentralCall>,
}

impl MockCentralRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, CentralCall::Connect(..)))
            .count()
    }

    pub fn last(&self) -> Option<&CentralCall> {
        self.calls.last()
    }
}

impl CentralRadio for MockCentralRadio {
    fn start_scan(&mut self, services: &[Uuid]) -> Result<(), String> {
        self.calls.push(CentralCall::StartScan(services.to_vec()));
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.calls.push(CentralCall::StopScan);
    }

    fn connect(&mut self, peer: &PeerId, session: SessionId) -> Result<(), String> {
        self.calls.push(CentralCall::Connect(*peer, session));
        Ok(())
    }

    fn cancel_connection(&mut self, peer: &PeerId, session: SessionId) {
        self.calls.push(CentralCall::Cancel(*peer, session));
    }

    fn discover_services(&mut self, _peer: &PeerId, session: SessionId, _filter: &[Uuid]) -> Result<(), String> {
        self.calls.push(CentralCall::DiscoverServices(session));
        Ok(())
    }

    fn discover_characteristics(
        &mut self,
        _peer: &PeerId,
        session: SessionId,
        _service: &Uuid,
        _filter: &[Uuid],
    ) -> Result<(), String> {
        self.calls.push(CentralCall::DiscoverCharacteristics(session));
        Ok(())
    }

    fn set_notify(
        &mut self,
        _peer: &PeerId,
        session: SessionId,
        _characteristic: &Uuid,
        enabled: bool,
    ) -> Result<(), String> {
        self.calls.push(CentralCall::SetNotify(session, enabled));
        Ok(())
    }
}

/// A peer advertising the demo service, optionally without a name.
pub fn demo_peer(name: Option<&str>) -> DiscoveredPeer {
    let mut advertisement = AdvertisementData::new().with_service_uuid(ServiceDescriptor::DEMO.service_uuid);
    if let Some(name) = name {
        advertisement = advertisement.with_local_name(name);
    }
    DiscoveredPeer::new(PeerId::new_random(), -50, advertisement)
}

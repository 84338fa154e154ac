//! Shared in-process medium connecting simulated radios

use super::radio::{SimCentral, SimPeripheral};
use crate::adapter::AdapterState;
use crate::gap::{adv_data, DiscoveredPeer, PeerId};
use crate::gatt::{GattService, SessionId, SubscriberId};
use crate::radio::{CentralEvent, PeripheralEvent};
use crate::uuid::Uuid;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct PeripheralNode {
    pub id: PeerId,
    pub rssi: i16,
    pub power: AdapterState,
    pub events: mpsc::UnboundedSender<PeripheralEvent>,
    pub service: Option<GattService>,
    pub advertising: Option<Vec<u8>>,
}

impl PeripheralNode {
    fn send(&self, event: PeripheralEvent) {
        if self.events.send(event).is_err() {
            trace!("peripheral {} runtime gone", self.id);
        }
    }

    /// What a scanner with `filter` would see, if anything.
    pub fn observe(&self, filter: &[Uuid]) -> Option<DiscoveredPeer> {
        let payload = self.advertising.as_deref()?;
        let advertisement = adv_data::decode(payload);
        if !filter.is_empty() && !filter.iter().any(|uuid| advertisement.advertises(uuid)) {
            return None;
        }
        Some(DiscoveredPeer::new(self.id, self.rssi, advertisement))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub peer: PeerId,
    pub session: SessionId,
    pub connected: bool,
    pub notifying: Option<Uuid>,
}

pub(crate) struct CentralNode {
    pub id: SubscriberId,
    pub power: AdapterState,
    pub events: mpsc::UnboundedSender<CentralEvent>,
    pub scan: Option<Vec<Uuid>>,
    pub links: Vec<Link>,
}

impl CentralNode {
    fn send(&self, event: CentralEvent) {
        if self.events.send(event).is_err() {
            trace!("central {} runtime gone", self.id);
        }
    }
}

#[derive(Default)]
pub(crate) struct AirState {
    pub peripherals: Vec<PeripheralNode>,
    pub centrals: Vec<CentralNode>,
}

impl AirState {
    pub fn peripheral(&self, id: &PeerId) -> Option<&PeripheralNode> {
        self.peripherals.iter().find(|node| node.id == *id)
    }

    pub fn peripheral_mut(&mut self, id: &PeerId) -> Option<&mut PeripheralNode> {
        self.peripherals.iter_mut().find(|node| node.id == *id)
    }

    pub fn central(&self, id: &SubscriberId) -> Option<&CentralNode> {
        self.centrals.iter().find(|node| node.id == *id)
    }

    pub fn central_mut(&mut self, id: &SubscriberId) -> Option<&mut CentralNode> {
        self.centrals.iter_mut().find(|node| node.id == *id)
    }

    pub fn send_to_peripheral(&self, id: &PeerId, event: PeripheralEvent) {
        if let Some(node) = self.peripheral(id) {
            node.send(event);
        }
    }

    pub fn send_to_central(&self, id: &SubscriberId, event: CentralEvent) {
        if let Some(node) = self.central(id) {
            node.send(event);
        }
    }

    /// Shows a newly advertising peripheral to every matching scanner.
    pub fn announce(&self, id: &PeerId) {
        let Some(peripheral) = self.peripheral(id) else {
            return;
        };
        for central in &self.centrals {
            if let Some(filter) = &central.scan {
                if let Some(peer) = peripheral.observe(filter) {
                    central.send(CentralEvent::Discovered(peer));
                }
            }
        }
    }

    /// Drops a link from both ends' point of view. The peripheral hears an
    /// unsubscribe if notifications were on.
    pub fn unlink(&mut self, central: &SubscriberId, peer: &PeerId) -> Option<Link> {
        let node = self.central_mut(central)?;
        let index = node.links.iter().position(|link| link.peer == *peer)?;
        let link = node.links.remove(index);
        if link.notifying.is_some() {
            self.send_to_peripheral(peer, PeripheralEvent::Unsubscribed(*central));
        }
        Some(link)
    }
}

/// An in-process radio medium.
///
/// Every simulated radio registered on the same `SimAir` can see and connect
/// to the others. Power, disconnects and raw traffic are controlled from the
/// outside.
#[derive(Clone, Default)]
pub struct SimAir {
    state: Arc<Mutex<AirState>>,
}

impl SimAir {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, AirState> {
        self.state.lock()
    }

    /// Adds a peripheral heard at `rssi`. Its adapter starts out `Unknown`.
    pub fn add_peripheral(&self, rssi: i16) -> (SimPeripheral, mpsc::UnboundedReceiver<PeripheralEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let id = PeerId::new_random();
        self.lock().peripherals.push(PeripheralNode {
            id,
            rssi,
            power: AdapterState::Unknown,
            events,
            service: None,
            advertising: None,
        });
        (SimPeripheral::new(self.clone(), id), receiver)
    }

    /// Adds a central. Its adapter starts out `Unknown`.
    pub fn add_central(&self) -> (SimCentral, mpsc::UnboundedReceiver<CentralEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let id = SubscriberId::new_random();
        self.lock().centrals.push(CentralNode {
            id,
            power: AdapterState::Unknown,
            events,
            scan: None,
            links: Vec::new(),
        });
        (SimCentral::new(self.clone(), id), receiver)
    }

    /// Changes a peripheral's adapter state. Leaving `PoweredOn` drops its
    /// service, its advertisement and every link to it.
    pub fn set_peripheral_power(&self, peer: &PeerId, power: AdapterState) {
        let mut air = self.lock();
        let Some(node) = air.peripheral_mut(peer) else {
            return;
        };
        let was_on = node.power.is_powered_on();
        node.power = power;
        if was_on && !power.is_powered_on() {
            node.service = None;
            node.advertising = None;
        }
        node.send(PeripheralEvent::StateChanged(power));

        if was_on && !power.is_powered_on() {
            for central in air.centrals.iter_mut() {
                let dropped: Vec<Link> = central.links.iter().filter(|link| link.peer == *peer).copied().collect();
                central.links.retain(|link| link.peer != *peer);
                for link in dropped {
                    debug!("link {} -> {} lost with peripheral power", central.id, peer);
                    central.send(CentralEvent::Disconnected {
                        peer: *peer,
                        session: link.session,
                        reason: Some("peripheral powered off".to_string()),
                    });
                }
            }
        }
    }

    /// Changes a central's adapter state. Leaving `PoweredOn` stops its scan
    /// and drops its links.
    pub fn set_central_power(&self, central: &SubscriberId, power: AdapterState) {
        let mut air = self.lock();
        let Some(node) = air.central_mut(central) else {
            return;
        };
        let was_on = node.power.is_powered_on();
        node.power = power;
        node.send(CentralEvent::StateChanged(power));

        if was_on && !power.is_powered_on() {
            node.scan = None;
            let peers: Vec<PeerId> = node.links.iter().map(|link| link.peer).collect();
            for peer in peers {
                air.unlink(central, &peer);
            }
        }
    }

    /// Peer-initiated disconnect of the link between `central` and `peer`.
    pub fn disconnect(&self, central: &SubscriberId, peer: &PeerId) -> bool {
        let mut air = self.lock();
        let Some(link) = air.unlink(central, peer) else {
            return false;
        };
        air.send_to_central(
            central,
            CentralEvent::Disconnected {
                peer: *peer,
                session: link.session,
                reason: Some("connection terminated by peer".to_string()),
            },
        );
        true
    }

    /// Delivers a raw advertisement to a scanning central, as if heard from
    /// `peer`. Returns `false` if the central is not scanning.
    pub fn inject_advertisement(&self, central: &SubscriberId, peer: PeerId, rssi: i16, payload: &[u8]) -> bool {
        let air = self.lock();
        let Some(node) = air.central(central) else {
            return false;
        };
        if node.scan.is_none() {
            return false;
        }
        let advertisement = adv_data::decode(payload);
        node.send(CentralEvent::Discovered(DiscoveredPeer::new(peer, rssi, advertisement)));
        true
    }

    /// Delivers a raw notification payload on the central's subscribed link.
    /// Returns `false` if there is none.
    pub fn inject_value(&self, central: &SubscriberId, value: &[u8]) -> bool {
        let air = self.lock();
        let Some(node) = air.central(central) else {
            return false;
        };
        let Some(link) = node.links.iter().find(|link| link.notifying.is_some()) else {
            return false;
        };
        let Some(characteristic) = link.notifying else {
            return false;
        };
        node.send(CentralEvent::ValueUpdated {
            peer: link.peer,
            session: link.session,
            characteristic,
            value: value.to_vec(),
        });
        true
    }
}

//! Radio trait implementations backed by [`SimAir`]

use super::air::{Link, SimAir};
use crate::gap::PeerId;
use crate::gatt::{CharacteristicInfo, CharacteristicProperties, GattService, SessionId, SubscriberId};
use crate::radio::{CentralEvent, CentralRadio, PeripheralEvent, PeripheralRadio};
use crate::uuid::Uuid;

const POWERED_OFF: &str = "adapter not powered on";

/// Peripheral-role radio on a [`SimAir`].
pub struct SimPeripheral {
    air: SimAir,
    id: PeerId,
}

impl SimPeripheral {
    pub(crate) fn new(air: SimAir, id: PeerId) -> Self {
        Self { air, id }
    }

    /// The identifier centrals see for this peripheral.
    pub fn peer_id(&self) -> PeerId {
        self.id
    }

    pub fn is_advertising(&self) -> bool {
        self.air
            .lock()
            .peripheral(&self.id)
            .is_some_and(|node| node.advertising.is_some())
    }
}

impl PeripheralRadio for SimPeripheral {
    fn add_service(&mut self, service: &GattService) -> Result<(), String> {
        let mut air = self.air.lock();
        let node = air.peripheral_mut(&self.id).ok_or("unknown peripheral")?;
        if !node.power.is_powered_on() {
            return Err(POWERED_OFF.to_string());
        }
        node.service = Some(service.clone());
        air.send_to_peripheral(&self.id, PeripheralEvent::ServiceAdded(Ok(())));
        Ok(())
    }

    fn start_advertising(&mut self, payload: &[u8]) -> Result<(), String> {
        let mut air = self.air.lock();
        let node = air.peripheral_mut(&self.id).ok_or("unknown peripheral")?;
        if !node.power.is_powered_on() {
            return Err(POWERED_OFF.to_string());
        }
        node.advertising = Some(payload.to_vec());
        air.send_to_peripheral(&self.id, PeripheralEvent::AdvertisingStarted(Ok(())));
        air.announce(&self.id);
        Ok(())
    }

    fn stop_advertising(&mut self) {
        if let Some(node) = self.air.lock().peripheral_mut(&self.id) {
            node.advertising = None;
        }
    }

    fn notify(&mut self, subscriber: &SubscriberId, characteristic: &Uuid, value: &[u8]) -> Result<(), String> {
        let air = self.air.lock();
        let central = air.central(subscriber).ok_or("unknown central")?;
        let link = central
            .links
            .iter()
            .find(|link| link.peer == self.id && link.notifying == Some(*characteristic))
            .ok_or("central is not subscribed")?;

        air.send_to_central(
            subscriber,
            CentralEvent::ValueUpdated {
                peer: self.id,
                session: link.session,
                characteristic: *characteristic,
                value: value.to_vec(),
            },
        );
        Ok(())
    }
}

/// Central-role radio on a [`SimAir`].
pub struct SimCentral {
    air: SimAir,
    id: SubscriberId,
}

impl SimCentral {
    pub(crate) fn new(air: SimAir, id: SubscriberId) -> Self {
        Self { air, id }
    }

    /// The identifier peripherals see for this central.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_scanning(&self) -> bool {
        self.air
            .lock()
            .central(&self.id)
            .is_some_and(|node| node.scan.is_some())
    }

    fn connected_service(&self, peer: &PeerId, session: SessionId) -> Result<Option<GattService>, String> {
        let air = self.air.lock();
        let central = air.central(&self.id).ok_or("unknown central")?;
        let linked = central
            .links
            .iter()
            .any(|link| link.peer == *peer && link.session == session && link.connected);
        if !linked {
            return Err("not connected".to_string());
        }
        Ok(air.peripheral(peer).and_then(|node| node.service.clone()))
    }
}

impl CentralRadio for SimCentral {
    fn start_scan(&mut self, services: &[Uuid]) -> Result<(), String> {
        let mut air = self.air.lock();
        let node = air.central_mut(&self.id).ok_or("unknown central")?;
        if !node.power.is_powered_on() {
            return Err(POWERED_OFF.to_string());
        }
        node.scan = Some(services.to_vec());

        let seen: Vec<_> = air
            .peripherals
            .iter()
            .filter(|peripheral| peripheral.power.is_powered_on())
            .filter_map(|peripheral| peripheral.observe(services))
            .collect();
        for peer in seen {
            air.send_to_central(&self.id, CentralEvent::Discovered(peer));
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        if let Some(node) = self.air.lock().central_mut(&self.id) {
            node.scan = None;
        }
    }

    fn connect(&mut self, peer: &PeerId, session: SessionId) -> Result<(), String> {
        let mut air = self.air.lock();
        let reachable = air
            .peripheral(peer)
            .is_some_and(|node| node.power.is_powered_on() && node.advertising.is_some());

        let node = air.central_mut(&self.id).ok_or("unknown central")?;
        if !node.power.is_powered_on() {
            return Err(POWERED_OFF.to_string());
        }
        node.links.retain(|link| link.peer != *peer);
        node.links.push(Link {
            peer: *peer,
            session,
            connected: reachable,
            notifying: None,
        });

        // Unreachable peers leave the attempt pending, like a real radio.
        if reachable {
            air.send_to_central(&self.id, CentralEvent::Connected { peer: *peer, session });
        }
        Ok(())
    }

    fn cancel_connection(&mut self, peer: &PeerId, _session: SessionId) {
        self.air.lock().unlink(&self.id, peer);
    }

    fn discover_services(&mut self, peer: &PeerId, session: SessionId, filter: &[Uuid]) -> Result<(), String> {
        let service = self.connected_service(peer, session)?;
        let services: Vec<Uuid> = service
            .map(|service| service.uuid)
            .into_iter()
            .filter(|uuid| filter.is_empty() || filter.contains(uuid))
            .collect();

        self.air.lock().send_to_central(
            &self.id,
            CentralEvent::ServicesDiscovered {
                peer: *peer,
                session,
                services: Ok(services),
            },
        );
        Ok(())
    }

    fn discover_characteristics(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        service: &Uuid,
        filter: &[Uuid],
    ) -> Result<(), String> {
        let hosted = self.connected_service(peer, session)?;
        let characteristics: Vec<CharacteristicInfo> = hosted
            .filter(|hosted| hosted.uuid == *service)
            .map(|hosted| {
                hosted
                    .characteristics
                    .iter()
                    .filter(|c| filter.is_empty() || filter.contains(&c.uuid))
                    .map(CharacteristicInfo::from)
                    .collect()
            })
            .unwrap_or_default();

        self.air.lock().send_to_central(
            &self.id,
            CentralEvent::CharacteristicsDiscovered {
                peer: *peer,
                session,
                service: *service,
                characteristics: Ok(characteristics),
            },
        );
        Ok(())
    }

    fn set_notify(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        characteristic: &Uuid,
        enabled: bool,
    ) -> Result<(), String> {
        let hosted = self.connected_service(peer, session)?;
        let notifiable = hosted
            .as_ref()
            .and_then(|service| service.characteristic(characteristic))
            .is_some_and(|c| c.properties.contains(CharacteristicProperties::NOTIFY));

        let mut air = self.air.lock();
        let result = if notifiable {
            if let Some(link) = air
                .central_mut(&self.id)
                .and_then(|node| node.links.iter_mut().find(|link| link.peer == *peer))
            {
                link.notifying = enabled.then_some(*characteristic);
            }
            let event = if enabled {
                PeripheralEvent::Subscribed(self.id)
            } else {
                PeripheralEvent::Unsubscribed(self.id)
            };
            air.send_to_peripheral(peer, event);
            Ok(enabled)
        } else {
            Err("characteristic does not support notifications".to_string())
        };

        air.send_to_central(
            &self.id,
            CentralEvent::NotificationStateChanged {
                peer: *peer,
                session,
                characteristic: *characteristic,
                result,
            },
        );
        Ok(())
    }
}

//! Platform radio boundary
//!
//! A platform backend implements [`PeripheralRadio`] and/or [`CentralRadio`]
//! to accept requests, and reports completions and spontaneous changes as
//! [`PeripheralEvent`] / [`CentralEvent`] values on one ordered channel per
//! adapter instance. Requests never block on a radio round-trip: an `Ok`
//! return only means the request was accepted.

use crate::adapter::AdapterState;
use crate::gap::{DiscoveredPeer, PeerId};
use crate::gatt::{CharacteristicInfo, GattService, SessionId, SubscriberId};
use crate::uuid::Uuid;

/// Requests a peripheral-role backend accepts.
pub trait PeripheralRadio: Send + 'static {
    /// Installs `service`. Completion is reported as
    /// [`PeripheralEvent::ServiceAdded`].
    fn add_service(&mut self, service: &GattService) -> Result<(), String>;

    /// Starts broadcasting the raw advertising payload. Completion is reported
    /// as [`PeripheralEvent::AdvertisingStarted`].
    fn start_advertising(&mut self, payload: &[u8]) -> Result<(), String>;

    fn stop_advertising(&mut self);

    /// Sends a notification to one subscriber.
    fn notify(
        &mut self,
        subscriber: &SubscriberId,
        characteristic: &Uuid,
        value: &[u8],
    ) -> Result<(), String>;
}

/// Requests a central-role backend accepts.
///
/// Link-level requests carry the [`SessionId`] of the session issuing them;
/// the backend echoes it in the matching [`CentralEvent`].
pub trait CentralRadio: Send + 'static {
    /// Starts scanning, restricted to peripherals advertising one of
    /// `services` when the list is non-empty.
    fn start_scan(&mut self, services: &[Uuid]) -> Result<(), String>;

    fn stop_scan(&mut self);

    fn connect(&mut self, peer: &PeerId, session: SessionId) -> Result<(), String>;

    /// Cancels a pending or established link. No event is reported back.
    fn cancel_connection(&mut self, peer: &PeerId, session: SessionId);

    fn discover_services(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        filter: &[Uuid],
    ) -> Result<(), String>;

    fn discover_characteristics(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        service: &Uuid,
        filter: &[Uuid],
    ) -> Result<(), String>;

    fn set_notify(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        characteristic: &Uuid,
        enabled: bool,
    ) -> Result<(), String>;
}

/// Callbacks from a peripheral-role backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    StateChanged(AdapterState),
    ServiceAdded(Result<(), String>),
    AdvertisingStarted(Result<(), String>),
    /// A central enabled notifications.
    Subscribed(SubscriberId),
    /// A central disabled notifications or went away.
    Unsubscribed(SubscriberId),
}

/// Callbacks from a central-role backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralEvent {
    StateChanged(AdapterState),
    Discovered(DiscoveredPeer),
    Connected {
        peer: PeerId,
        session: SessionId,
    },
    ConnectFailed {
        peer: PeerId,
        session: SessionId,
        reason: String,
    },
    Disconnected {
        peer: PeerId,
        session: SessionId,
        reason: Option<String>,
    },
    ServicesDiscovered {
        peer: PeerId,
        session: SessionId,
        services: Result<Vec<Uuid>, String>,
    },
    CharacteristicsDiscovered {
        peer: PeerId,
        session: SessionId,
        service: Uuid,
        characteristics: Result<Vec<CharacteristicInfo>, String>,
    },
    NotificationStateChanged {
        peer: PeerId,
        session: SessionId,
        characteristic: Uuid,
        result: Result<bool, String>,
    },
    ValueUpdated {
        peer: PeerId,
        session: SessionId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

impl CentralEvent {
    /// Session the callback belongs to, for link-level callbacks.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            CentralEvent::StateChanged(_) | CentralEvent::Discovered(_) => None,
            CentralEvent::Connected { session, .. }
            | CentralEvent::ConnectFailed { session, .. }
            | CentralEvent::Disconnected { session, .. }
            | CentralEvent::ServicesDiscovered { session, .. }
            | CentralEvent::CharacteristicsDiscovered { session, .. }
            | CentralEvent::NotificationStateChanged { session, .. }
            | CentralEvent::ValueUpdated { session, .. } => Some(*session),
        }
    }
}

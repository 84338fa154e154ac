//! GATT Client implementation
//!
//! Drives one connection session through the discovery chain
//! (service, characteristic, subscription) and decodes the notifications it
//! receives into [`ObservedState`].
//!
//! Every link-level callback carries the [`SessionId`] it was issued under.
//! Callbacks for a session that is no longer current are ignored.

use super::types::{CharacteristicInfo, CharacteristicProperties, DiscoveryStage, ServiceDescriptor};
use crate::channel::{DecodeError, NotificationEvent, WireFormat};
use crate::error::{Error, Result};
use crate::gap::PeerId;
use crate::radio::CentralRadio;
use crate::uuid::Uuid;
use log::{debug, info, trace, warn};
use std::fmt;

/// Identifies one connection attempt. Strictly increasing per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection state as surfaced to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected,
    DiscoveringService,
    DiscoveringCharacteristic,
    Subscribing,
    Subscribed,
    Failed,
}

impl SessionState {
    /// Whether a link to a peer exists or is being established.
    pub fn is_link_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Connected
                | SessionState::DiscoveringService
                | SessionState::DiscoveringCharacteristic
                | SessionState::Subscribing
                | SessionState::Subscribed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::DiscoveringService => "discovering service",
            SessionState::DiscoveringCharacteristic => "discovering characteristic",
            SessionState::Subscribing => "subscribing",
            SessionState::Subscribed => "subscribed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSession {
    pub peer: PeerId,
    pub id: SessionId,
    pub state: SessionState,
    /// Set once the notify characteristic was found.
    pub characteristic: Option<Uuid>,
}

/// What the central has learned from the peripheral so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObservedState {
    pub connected: bool,
    /// Flipped once per button press.
    pub last_button_toggle: bool,
    /// `None` until the first slider value arrives.
    pub last_slider_value: Option<u8>,
}

/// Result of feeding a link-level callback to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Stale, or not expected in the current state.
    Ignored,
    /// The link came up and service discovery was requested.
    Connected,
    Advanced(SessionState),
    /// The session was aborted and its link cancelled.
    Failed(Error),
    /// The link went away.
    Closed,
    Received(NotificationEvent),
    Dropped(DecodeError),
}

#[derive(Debug)]
pub struct GattClient {
    descriptor: ServiceDescriptor,
    wire_format: WireFormat,
    next_session: u64,
    session: Option<ConnectionSession>,
    observed: ObservedState,
    malformed_payloads: u64,
}

impl GattClient {
    pub fn new(descriptor: ServiceDescriptor, wire_format: WireFormat) -> Self {
        Self {
            descriptor,
            wire_format,
            next_session: 0,
            session: None,
            observed: ObservedState::default(),
            malformed_payloads: 0,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn session(&self) -> Option<&ConnectionSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.map(|session| session.state)
    }

    pub fn observed(&self) -> &ObservedState {
        &self.observed
    }

    pub fn malformed_payloads(&self) -> u64 {
        self.malformed_payloads
    }

    /// Starts a new session with `peer`, tearing down any current one.
    pub fn connect<R: CentralRadio>(&mut self, peer: PeerId, radio: &mut R) -> Result<SessionId> {
        if let Some(previous) = self.teardown(radio) {
            info!("Session {} with {} superseded", previous.id, previous.peer);
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);
        radio.connect(&peer, id).map_err(Error::Platform)?;

        self.session = Some(ConnectionSession {
            peer,
            id,
            state: SessionState::Connecting,
            characteristic: None,
        });
        info!("Connecting to {} (session {})", peer, id);
        Ok(id)
    }

    /// Cancels the current session's link, if any.
    pub fn teardown<R: CentralRadio>(&mut self, radio: &mut R) -> Option<ConnectionSession> {
        let session = self.session.take()?;
        radio.cancel_connection(&session.peer, session.id);
        self.observed.connected = false;
        Some(session)
    }

    /// Forgets the current session without talking to the radio, for when
    /// the link is already gone (adapter powered off).
    pub fn reset(&mut self) -> Option<ConnectionSession> {
        self.observed.connected = false;
        self.session.take()
    }

    /// Aborts the current session with `error`.
    pub fn fail_current<R: CentralRadio>(&mut self, error: Error, radio: &mut R) -> LinkOutcome {
        if let Some(session) = self.teardown(radio) {
            warn!("Session {} with {} failed: {}", session.id, session.peer, error);
        }
        LinkOutcome::Failed(error)
    }

    pub fn on_connected<R: CentralRadio>(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        radio: &mut R,
    ) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::Connecting) {
            return LinkOutcome::Ignored;
        }

        self.observed.connected = true;
        self.set_state(SessionState::Connected);
        info!("Connected to {}", peer);

        let service = self.descriptor.service_uuid;
        if let Err(reason) = radio.discover_services(peer, session, &[service]) {
            return self.fail_current(Error::Platform(reason), radio);
        }
        self.set_state(SessionState::DiscoveringService);
        LinkOutcome::Connected
    }

    pub fn on_connect_failed(&mut self, peer: &PeerId, session: SessionId, reason: String) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::Connecting) {
            return LinkOutcome::Ignored;
        }

        warn!("Failed to connect to {}: {}", peer, reason);
        self.reset();
        LinkOutcome::Failed(Error::Platform(reason))
    }

    pub fn on_services<R: CentralRadio>(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        services: std::result::Result<Vec<Uuid>, String>,
        radio: &mut R,
    ) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::DiscoveringService) {
            return LinkOutcome::Ignored;
        }

        let service = self.descriptor.service_uuid;
        let found = match services {
            Ok(services) => services.contains(&service),
            Err(reason) => {
                debug!("Service discovery error: {}", reason);
                false
            }
        };
        if !found {
            return self.fail_current(Error::DiscoveryFailed(DiscoveryStage::Service), radio);
        }

        let characteristic = self.descriptor.characteristic_uuid;
        if let Err(reason) = radio.discover_characteristics(peer, session, &service, &[characteristic]) {
            return self.fail_current(Error::Platform(reason), radio);
        }
        self.set_state(SessionState::DiscoveringCharacteristic);
        LinkOutcome::Advanced(SessionState::DiscoveringCharacteristic)
    }

    pub fn on_characteristics<R: CentralRadio>(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        service: &Uuid,
        characteristics: std::result::Result<Vec<CharacteristicInfo>, String>,
        radio: &mut R,
    ) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::DiscoveringCharacteristic) {
            return LinkOutcome::Ignored;
        }
        if *service != self.descriptor.service_uuid {
            trace!("Characteristics of unrelated service {}", service);
            return LinkOutcome::Ignored;
        }

        let wanted = self.descriptor.characteristic_uuid;
        let found = characteristics.unwrap_or_default().into_iter().any(|c| {
            c.uuid == wanted && c.properties.contains(CharacteristicProperties::NOTIFY)
        });
        if !found {
            return self.fail_current(Error::DiscoveryFailed(DiscoveryStage::Characteristic), radio);
        }

        if let Err(reason) = radio.set_notify(peer, session, &wanted, true) {
            return self.fail_current(Error::Platform(reason), radio);
        }
        if let Some(current) = self.session.as_mut() {
            current.characteristic = Some(wanted);
        }
        self.set_state(SessionState::Subscribing);
        LinkOutcome::Advanced(SessionState::Subscribing)
    }

    pub fn on_notification_state<R: CentralRadio>(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        characteristic: &Uuid,
        result: std::result::Result<bool, String>,
        radio: &mut R,
    ) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::Subscribing)
            || *characteristic != self.descriptor.characteristic_uuid
        {
            return LinkOutcome::Ignored;
        }

        match result {
            Ok(true) => {
                self.set_state(SessionState::Subscribed);
                info!("Subscribed to {} on {}", characteristic, peer);
                LinkOutcome::Advanced(SessionState::Subscribed)
            }
            Ok(false) => self.fail_current(Error::DiscoveryFailed(DiscoveryStage::Subscription), radio),
            Err(reason) => {
                debug!("Subscription error: {}", reason);
                self.fail_current(Error::DiscoveryFailed(DiscoveryStage::Subscription), radio)
            }
        }
    }

    /// Decodes a notification and applies it to the observed state.
    ///
    /// Only processed while subscribed; malformed payloads are counted and
    /// leave the observed state untouched.
    pub fn on_value(
        &mut self,
        peer: &PeerId,
        session: SessionId,
        characteristic: &Uuid,
        value: &[u8],
    ) -> LinkOutcome {
        if !self.expects(peer, session, SessionState::Subscribed)
            || *characteristic != self.descriptor.characteristic_uuid
        {
            return LinkOutcome::Ignored;
        }

        match self.wire_format.decode(value) {
            Ok(event) => {
                match event {
                    NotificationEvent::ButtonPress => {
                        self.observed.last_button_toggle = !self.observed.last_button_toggle;
                    }
                    NotificationEvent::SliderValue(level) => {
                        self.observed.last_slider_value = Some(level);
                    }
                }
                trace!("Received {}", event);
                LinkOutcome::Received(event)
            }
            Err(err) => {
                self.malformed_payloads += 1;
                warn!("Dropping payload {}: {}", hex::encode(value), Error::MalformedPayload(err));
                LinkOutcome::Dropped(err)
            }
        }
    }

    pub fn on_disconnected(&mut self, peer: &PeerId, session: SessionId, reason: Option<String>) -> LinkOutcome {
        if !self.is_current(peer, session) {
            return LinkOutcome::Ignored;
        }

        match reason {
            Some(reason) => info!("Disconnected from {}: {}", peer, reason),
            None => info!("Disconnected from {}", peer),
        }
        self.reset();
        LinkOutcome::Closed
    }

    fn is_current(&self, peer: &PeerId, session: SessionId) -> bool {
        match &self.session {
            Some(current) if current.id == session && current.peer == *peer => true,
            _ => {
                debug!("Ignoring callback for session {}: {}", session, Error::SessionSuperseded);
                false
            }
        }
    }

    fn expects(&self, peer: &PeerId, session: SessionId, state: SessionState) -> bool {
        if !self.is_current(peer, session) {
            return false;
        }
        match self.state() {
            Some(current) if current == state => true,
            current => {
                debug!("Unexpected callback in state {:?}", current);
                false
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if let Some(current) = self.session.as_mut() {
            trace!("Session {}: {} -> {}", current.id, current.state, state);
            current.state = state;
        }
    }
}

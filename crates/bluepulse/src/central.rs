//! Central role runtime
//!
//! Same shape as [`crate::peripheral`]: a [`CentralCore`] owned by one task,
//! fed by commands and [`CentralEvent`]s. The task additionally arms a timer
//! for each connection attempt; if the session is not subscribed when it
//! fires, the session fails with [`Error::Timeout`].

use crate::adapter::{AdapterContext, AdapterState};
use crate::channel::NotificationEvent;
use crate::config::CentralConfig;
use crate::error::{Error, Result};
use crate::gap::{ConnectionScanner, DiscoveredPeer, Discovery, PeerId, ScanStrategy};
use crate::gatt::{GattClient, LinkOutcome, ObservedState, SessionId, SessionState};
use crate::radio::{CentralEvent, CentralRadio};
use crate::relay::{relay, RelayReceiver, RelaySender};
use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Level state of the central. Slider values only travel this way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CentralSnapshot {
    pub adapter: AdapterState,
    pub session: SessionState,
    pub peer: Option<PeerId>,
    pub observed: ObservedState,
    /// Only populated by [`ScanStrategy::CollectAll`].
    pub discovered_peers: Vec<DiscoveredPeer>,
    pub malformed_payloads: u64,
}

/// Discrete central events, each delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralUpdate {
    AdapterChanged(AdapterState),
    SessionChanged {
        state: SessionState,
        peer: Option<PeerId>,
    },
    PeerDiscovered(DiscoveredPeer),
    /// One per received button press, carrying the new toggle value.
    ButtonToggled(bool),
    SessionFailed(Error),
    ScanFailed(Error),
}

pub type CentralUpdates = RelayReceiver<CentralUpdate, CentralSnapshot>;

pub struct CentralCore<R> {
    radio: R,
    adapter: AdapterContext,
    scanner: ConnectionScanner,
    client: GattClient,
    config: CentralConfig,
    deadline: Option<Instant>,
    last_state: SessionState,
    last_peer: Option<PeerId>,
    relay: RelaySender<CentralUpdate, CentralSnapshot>,
}

impl<R: CentralRadio> CentralCore<R> {
    pub fn new(radio: R, config: CentralConfig) -> (Self, CentralUpdates) {
        let (tx, rx) = relay(CentralSnapshot::default());
        let core = Self {
            radio,
            adapter: AdapterContext::new(),
            scanner: ConnectionScanner::new(config.strategy, config.descriptor.service_uuid),
            client: GattClient::new(config.descriptor, config.wire_format),
            config,
            deadline: None,
            last_state: SessionState::Idle,
            last_peer: None,
            relay: tx,
        };
        (core, rx)
    }

    pub fn adapter(&self) -> &AdapterContext {
        &self.adapter
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn scanner(&self) -> &ConnectionScanner {
        &self.scanner
    }

    pub fn client(&self) -> &GattClient {
        &self.client
    }

    /// When the current connection attempt times out, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn session_state(&self) -> SessionState {
        match self.client.state() {
            Some(state) => state,
            None if self.scanner.is_scanning() => SessionState::Scanning,
            None => SessionState::Idle,
        }
    }

    /// Starts scanning, superseding any current session. Peers skipped
    /// after failed sessions become eligible again.
    pub fn start_scan(&mut self) -> Result<()> {
        if let Some(previous) = self.client.teardown(&mut self.radio) {
            info!("Session {} with {} superseded by a new scan", previous.id, previous.peer);
            self.deadline = None;
        }
        self.scanner.forget_skipped();
        let started = self.scanner.start(self.adapter.state(), &mut self.radio);
        self.sync();
        started.map(|_| ())
    }

    pub fn stop_scan(&mut self) {
        self.scanner.stop(&mut self.radio);
        self.sync();
    }

    /// Connects to an explicitly chosen peer, stopping any scan.
    pub fn connect(&mut self, peer: PeerId) -> Result<SessionId> {
        self.adapter.check_ready()?;
        if self.scanner.strategy() == ScanStrategy::CollectAll && self.scanner.find(&peer).is_none() {
            return Err(Error::UnknownPeer(peer));
        }
        self.scanner.stop(&mut self.radio);
        let session = self.open_session(peer);
        self.sync();
        session
    }

    /// Tears down the current session. Returns `false` if there was none.
    pub fn disconnect(&mut self) -> bool {
        let closed = self.client.teardown(&mut self.radio).is_some();
        self.deadline = None;
        self.sync();
        closed
    }

    pub fn handle_event(&mut self, event: CentralEvent) {
        match event {
            CentralEvent::StateChanged(state) => self.on_state_changed(state),
            CentralEvent::Discovered(peer) => match self.scanner.on_discovered(peer, &mut self.radio) {
                Discovery::Collected(peer) => self.relay.emit(CentralUpdate::PeerDiscovered(peer)),
                Discovery::Selected(peer) => {
                    let id = peer.id;
                    self.relay.emit(CentralUpdate::PeerDiscovered(peer));
                    if let Err(err) = self.open_session(id) {
                        self.fail_session(err, Some(id));
                    }
                }
                Discovery::Duplicate | Discovery::Ignored => trace!("Advertisement ignored"),
            },
            CentralEvent::Connected { peer, session } => {
                let outcome = self.client.on_connected(&peer, session, &mut self.radio);
                self.apply(outcome);
            }
            CentralEvent::ConnectFailed { peer, session, reason } => {
                let outcome = self.client.on_connect_failed(&peer, session, reason);
                self.apply(outcome);
            }
            CentralEvent::Disconnected { peer, session, reason } => {
                let outcome = self.client.on_disconnected(&peer, session, reason);
                self.apply(outcome);
            }
            CentralEvent::ServicesDiscovered { peer, session, services } => {
                let outcome = self.client.on_services(&peer, session, services, &mut self.radio);
                self.apply(outcome);
            }
            CentralEvent::CharacteristicsDiscovered {
                peer,
                session,
                service,
                characteristics,
            } => {
                let outcome = self.client.on_characteristics(
                    &peer,
                    session,
                    &service,
                    characteristics,
                    &mut self.radio,
                );
                self.apply(outcome);
            }
            CentralEvent::NotificationStateChanged {
                peer,
                session,
                characteristic,
                result,
            } => {
                let outcome = self.client.on_notification_state(
                    &peer,
                    session,
                    &characteristic,
                    result,
                    &mut self.radio,
                );
                self.apply(outcome);
            }
            CentralEvent::ValueUpdated {
                peer,
                session,
                characteristic,
                value,
            } => {
                let outcome = self.client.on_value(&peer, session, &characteristic, &value);
                self.apply(outcome);
            }
        }
        self.sync();
    }

    /// Fails the session if it is still not subscribed.
    pub fn on_timeout(&mut self) {
        self.deadline = None;
        match self.client.session() {
            Some(session) if session.state != SessionState::Subscribed => {
                self.last_peer = Some(session.peer);
                let outcome = self.client.fail_current(Error::Timeout, &mut self.radio);
                self.apply(outcome);
            }
            _ => {}
        }
        self.sync();
    }

    pub fn shutdown(&mut self) {
        self.client.teardown(&mut self.radio);
        self.scanner.stop(&mut self.radio);
        self.deadline = None;
        self.sync();
    }

    fn on_state_changed(&mut self, state: AdapterState) {
        let Some(transition) = self.adapter.apply(state) else {
            return;
        };
        info!("Adapter {} -> {}", transition.from, transition.to);
        self.relay.emit(CentralUpdate::AdapterChanged(state));

        if transition.powered_off() {
            self.scanner.on_power_lost();
            if let Some(session) = self.client.reset() {
                info!("Session {} with {} lost with the adapter", session.id, session.peer);
            }
            self.deadline = None;
        }
        if transition.became_unavailable() {
            if let Some(err) = self.scanner.on_unavailable(state) {
                self.relay.emit(CentralUpdate::ScanFailed(err));
            }
        }
        if transition.powered_on() {
            if let Err(err) = self.scanner.on_power_on(&mut self.radio) {
                warn!("Could not resume scanning: {}", err);
                self.relay.emit(CentralUpdate::ScanFailed(err));
            }
        }
    }

    fn open_session(&mut self, peer: PeerId) -> Result<SessionId> {
        let session = self.client.connect(peer, &mut self.radio)?;
        self.deadline = self.config.connect_timeout.map(|timeout| Instant::now() + timeout);
        Ok(session)
    }

    fn apply(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Ignored => {}
            LinkOutcome::Connected => {
                self.last_peer = self.client.session().map(|session| session.peer);
                self.transition(SessionState::Connected);
            }
            LinkOutcome::Advanced(SessionState::Subscribed) => self.deadline = None,
            LinkOutcome::Advanced(_) => {}
            LinkOutcome::Failed(err) => self.fail_session(err, self.last_peer),
            LinkOutcome::Closed => self.deadline = None,
            LinkOutcome::Received(NotificationEvent::ButtonPress) => {
                let toggle = self.client.observed().last_button_toggle;
                self.relay.emit(CentralUpdate::ButtonToggled(toggle));
            }
            LinkOutcome::Received(NotificationEvent::SliderValue(_)) => {}
            LinkOutcome::Dropped(err) => debug!("Notification dropped: {}", err),
        }
    }

    /// Surfaces a failed session, then falls back to scanning or idle.
    ///
    /// Under [`ScanStrategy::SelectFirst`] the failed peer is skipped by the
    /// fallback scan, so it is not selected again until the next explicit
    /// [`start_scan`](Self::start_scan).
    fn fail_session(&mut self, err: Error, peer: Option<PeerId>) {
        self.deadline = None;
        self.transition(SessionState::Failed);
        self.relay.emit(CentralUpdate::SessionFailed(err));

        if let Some(peer) = peer {
            if self.scanner.skip(peer) {
                debug!("Skipping {} until the next scan request", peer);
            }
        }

        if self.config.rescan_on_failure && self.adapter.state().is_powered_on() {
            if let Err(err) = self.scanner.start(self.adapter.state(), &mut self.radio) {
                self.relay.emit(CentralUpdate::ScanFailed(err));
            }
        }
    }

    fn transition(&mut self, state: SessionState) {
        if state == self.last_state {
            return;
        }
        debug!("Session {} -> {}", self.last_state, state);
        self.last_state = state;
        self.relay.emit(CentralUpdate::SessionChanged {
            state,
            peer: self.last_peer,
        });
    }

    fn sync(&mut self) {
        if let Some(session) = self.client.session() {
            self.last_peer = Some(session.peer);
        }
        let state = self.session_state();
        if !state.is_link_active() && state != self.last_state {
            self.last_peer = None;
        }
        self.transition(state);

        let observed = *self.client.observed();
        let discovered_peers = self.scanner.discovered();
        let malformed_payloads = self.client.malformed_payloads();
        let adapter = self.adapter.state();
        let peer = self.client.session().map(|session| session.peer);
        self.relay.update(|snapshot| {
            let next = CentralSnapshot {
                adapter,
                session: state,
                peer,
                observed,
                discovered_peers: discovered_peers.to_vec(),
                malformed_payloads,
            };
            if *snapshot == next {
                return false;
            }
            *snapshot = next;
            true
        });
    }
}

enum Command {
    StartScan {
        reply: oneshot::Sender<Result<()>>,
    },
    StopScan {
        reply: oneshot::Sender<()>,
    },
    Connect {
        peer: PeerId,
        reply: oneshot::Sender<Result<SessionId>>,
    },
    Disconnect {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Handle to a running central task.
pub struct Central {
    commands: mpsc::UnboundedSender<Command>,
    adapter: watch::Receiver<AdapterState>,
    task: JoinHandle<()>,
}

impl Central {
    pub fn spawn<R: CentralRadio>(
        radio: R,
        events: mpsc::UnboundedReceiver<CentralEvent>,
        config: CentralConfig,
    ) -> (Self, CentralUpdates) {
        let (core, updates) = CentralCore::new(radio, config);
        let adapter = core.adapter().subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(core, command_rx, events));

        (
            Self {
                commands,
                adapter,
                task,
            },
            updates,
        )
    }

    pub fn adapter_state(&self) -> AdapterState {
        *self.adapter.borrow()
    }

    pub fn watch_adapter(&self) -> watch::Receiver<AdapterState> {
        self.adapter.clone()
    }

    /// Scans now, or once the adapter powers on.
    pub async fn start_scan(&self) -> Result<()> {
        self.request(|reply| Command::StartScan { reply }).await?
    }

    pub async fn stop_scan(&self) -> Result<()> {
        self.request(|reply| Command::StopScan { reply }).await
    }

    pub async fn connect(&self, peer: PeerId) -> Result<SessionId> {
        self.request(|reply| Command::Connect { peer, reply }).await?
    }

    pub async fn disconnect(&self) -> Result<bool> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Tears down the session, stops scanning and waits for the task.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|_| Error::Stopped)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(build(reply)).map_err(|_| Error::Stopped)?;
        response.await.map_err(|_| Error::Stopped)
    }
}

async fn run<R: CentralRadio>(
    mut core: CentralCore<R>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<CentralEvent>,
) {
    let mut events_open = true;

    loop {
        let deadline = core.deadline();

        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::StartScan { reply }) => {
                    let _ = reply.send(core.start_scan());
                }
                Some(Command::StopScan { reply }) => {
                    core.stop_scan();
                    let _ = reply.send(());
                }
                Some(Command::Connect { peer, reply }) => {
                    let _ = reply.send(core.connect(peer));
                }
                Some(Command::Disconnect { reply }) => {
                    let _ = reply.send(core.disconnect());
                }
                Some(Command::Shutdown) | None => break,
            },

            event = events.recv(), if events_open => match event {
                Some(event) => core.handle_event(event),
                None => {
                    debug!("Central event stream closed");
                    events_open = false;
                }
            },

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                core.on_timeout();
            }
        }
    }

    core.shutdown();
    debug!("Central runtime stopped");
}

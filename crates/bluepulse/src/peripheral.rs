//! Peripheral role runtime
//!
//! [`Peripheral::spawn`] moves a [`PeripheralCore`] into its own task. The
//! task is the only place the core is touched: caller requests arrive as
//! commands, platform callbacks as [`PeripheralEvent`]s, and both are
//! processed one at a time, commands first. Results flow back through the
//! relay returned alongside the handle.

use crate::adapter::{AdapterContext, AdapterState};
use crate::channel::NotificationEvent;
use crate::config::PeripheralConfig;
use crate::error::{Error, Result};
use crate::gap::{AdvertisementBroadcaster, AdvertisementData, AdvertisingState};
use crate::gatt::{GattServer, PublishReport, RegistrationState, ServiceDescriptor, SubscriberId};
use crate::radio::{PeripheralEvent, PeripheralRadio};
use crate::relay::{relay, RelayReceiver, RelaySender};
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Level state of the peripheral. Coalesced: readers only see the latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeripheralSnapshot {
    pub adapter: AdapterState,
    pub advertising: AdvertisingState,
    pub registration: RegistrationState,
    pub subscriber_count: usize,
    pub delivered: u64,
    pub failed: u64,
}

/// Discrete peripheral events, each delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralUpdate {
    AdapterChanged(AdapterState),
    ServiceRegistered,
    AdvertisingChanged(AdvertisingState),
    AdvertisingFailed(Error),
    SubscriberAdded { id: SubscriberId, count: usize },
    SubscriberRemoved { id: SubscriberId, count: usize },
}

pub type PeripheralUpdates = RelayReceiver<PeripheralUpdate, PeripheralSnapshot>;

/// State machines of the peripheral role, driven synchronously.
pub struct PeripheralCore<R> {
    radio: R,
    adapter: AdapterContext,
    broadcaster: AdvertisementBroadcaster,
    server: GattServer,
    config: PeripheralConfig,
    wants_service: bool,
    last_advertising: AdvertisingState,
    relay: RelaySender<PeripheralUpdate, PeripheralSnapshot>,
}

impl<R: PeripheralRadio> PeripheralCore<R> {
    pub fn new(radio: R, config: PeripheralConfig) -> (Self, PeripheralUpdates) {
        let (tx, rx) = relay(PeripheralSnapshot::default());
        let core = Self {
            radio,
            adapter: AdapterContext::new(),
            broadcaster: AdvertisementBroadcaster::new(),
            server: GattServer::new(config.wire_format),
            config,
            wants_service: false,
            last_advertising: AdvertisingState::Idle,
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

    pub fn server(&self) -> &GattServer {
        &self.server
    }

    pub fn broadcaster(&self) -> &AdvertisementBroadcaster {
        &self.broadcaster
    }

    /// Installs the service now, or as soon as the adapter powers on.
    pub fn register_service(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        let state = self.adapter.state();
        if state.is_unavailable() {
            return Err(Error::RadioUnavailable(state));
        }
        self.server.set_descriptor(descriptor)?;
        self.wants_service = true;
        self.advance();
        self.sync();
        Ok(())
    }

    /// Registers the service if needed, then advertises it. Deferred until
    /// the adapter powers on.
    pub fn start_advertising(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        let state = self.adapter.state();
        self.server.set_descriptor(descriptor)?;

        let mut data = AdvertisementData::new()
            .with_local_name(descriptor.local_name)
            .with_service_uuid(descriptor.service_uuid);
        if let Some(manufacturer) = &self.config.manufacturer_data {
            data = data.with_manufacturer_data(manufacturer.clone());
        }

        self.broadcaster.start(&data, state)?;
        self.wants_service = true;
        self.advance();
        self.sync();
        Ok(())
    }

    pub fn stop_advertising(&mut self) {
        self.broadcaster.stop(&mut self.radio);
        self.sync();
    }

    pub fn publish(&mut self, event: NotificationEvent) -> Result<PublishReport> {
        let report = self.server.publish(event, &mut self.radio)?;
        self.sync();
        Ok(report)
    }

    pub fn handle_event(&mut self, event: PeripheralEvent) {
        match event {
            PeripheralEvent::StateChanged(state) => self.on_state_changed(state),
            PeripheralEvent::ServiceAdded(result) => match self.server.on_service_added(result) {
                Ok(true) => {
                    self.relay.emit(PeripheralUpdate::ServiceRegistered);
                    self.advance();
                }
                Ok(false) => {}
                Err(err) => {
                    self.wants_service = false;
                    if self.broadcaster.stop(&mut self.radio) {
                        self.relay.emit(PeripheralUpdate::AdvertisingFailed(err));
                    }
                }
            },
            PeripheralEvent::AdvertisingStarted(result) => {
                if let Some(Err(err)) = self.broadcaster.on_started(result, &mut self.radio) {
                    self.relay.emit(PeripheralUpdate::AdvertisingFailed(err));
                }
            }
            PeripheralEvent::Subscribed(id) => {
                if self.server.on_subscribe(id) {
                    let count = self.server.subscriber_count();
                    self.relay.emit(PeripheralUpdate::SubscriberAdded { id, count });
                }
            }
            PeripheralEvent::Unsubscribed(id) => {
                if self.server.on_unsubscribe(&id) {
                    let count = self.server.subscriber_count();
                    self.relay.emit(PeripheralUpdate::SubscriberRemoved { id, count });
                }
            }
        }
        self.sync();
    }

    /// Stops advertising before the runtime goes away.
    pub fn shutdown(&mut self) {
        self.broadcaster.stop(&mut self.radio);
        self.sync();
    }

    fn on_state_changed(&mut self, state: AdapterState) {
        let Some(transition) = self.adapter.apply(state) else {
            return;
        };
        info!("Adapter {} -> {}", transition.from, transition.to);
        self.relay.emit(PeripheralUpdate::AdapterChanged(state));

        if transition.powered_off() {
            self.broadcaster.on_power_lost();
            let dropped = self.server.reset();
            let mut count = dropped.len();
            for id in dropped {
                count -= 1;
                self.relay.emit(PeripheralUpdate::SubscriberRemoved { id, count });
            }
        }
        if transition.became_unavailable() {
            if let Some(err) = self.broadcaster.on_unavailable(state) {
                self.relay.emit(PeripheralUpdate::AdvertisingFailed(err));
            }
            self.wants_service = false;
        }
        if transition.powered_on() {
            self.advance();
        }
    }

    /// Moves registration and advertising forward as far as the adapter
    /// allows: register first, broadcast once registered.
    fn advance(&mut self) {
        if !self.adapter.state().is_powered_on() {
            return;
        }

        if self.wants_service && self.server.registration() == RegistrationState::Unregistered {
            if let Some(descriptor) = self.server.descriptor().copied() {
                if let Err(err) = self.server.register_service(descriptor, &mut self.radio) {
                    warn!("Could not register service: {}", err);
                    if self.broadcaster.stop(&mut self.radio) {
                        self.relay.emit(PeripheralUpdate::AdvertisingFailed(err));
                    }
                    return;
                }
            }
        }

        if self.server.is_registered() {
            if let Err(err) = self.broadcaster.broadcast(&mut self.radio) {
                warn!("Could not start advertising: {}", err);
                self.relay.emit(PeripheralUpdate::AdvertisingFailed(err));
            }
        }
    }

    fn sync(&mut self) {
        let advertising = self.broadcaster.state();
        if advertising != self.last_advertising {
            debug!("Advertising {:?} -> {:?}", self.last_advertising, advertising);
            self.last_advertising = advertising;
            self.relay.emit(PeripheralUpdate::AdvertisingChanged(advertising));
        }

        self.relay.publish(PeripheralSnapshot {
            adapter: self.adapter.state(),
            advertising,
            registration: self.server.registration(),
            subscriber_count: self.server.subscriber_count(),
            delivered: self.server.delivered_total(),
            failed: self.server.failed_total(),
        });
    }
}

enum Command {
    RegisterService {
        descriptor: ServiceDescriptor,
        reply: oneshot::Sender<Result<()>>,
    },
    StartAdvertising {
        descriptor: ServiceDescriptor,
        reply: oneshot::Sender<Result<()>>,
    },
    StopAdvertising {
        reply: oneshot::Sender<()>,
    },
    Publish {
        event: NotificationEvent,
        reply: oneshot::Sender<Result<PublishReport>>,
    },
    Shutdown,
}

/// Handle to a running peripheral task.
pub struct Peripheral {
    commands: mpsc::UnboundedSender<Command>,
    adapter: watch::Receiver<AdapterState>,
    task: JoinHandle<()>,
}

impl Peripheral {
    /// Spawns the runtime task. `events` must carry every callback of the
    /// backend behind `radio`, in the order the platform produced them.
    pub fn spawn<R: PeripheralRadio>(
        radio: R,
        events: mpsc::UnboundedReceiver<PeripheralEvent>,
        config: PeripheralConfig,
    ) -> (Self, PeripheralUpdates) {
        let (core, updates) = PeripheralCore::new(radio, config);
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

    pub async fn register_service(&self, descriptor: ServiceDescriptor) -> Result<()> {
        self.request(|reply| Command::RegisterService { descriptor, reply }).await?
    }

    pub async fn start_advertising(&self, descriptor: ServiceDescriptor) -> Result<()> {
        self.request(|reply| Command::StartAdvertising { descriptor, reply }).await?
    }

    pub async fn stop_advertising(&self) -> Result<()> {
        self.request(|reply| Command::StopAdvertising { reply }).await
    }

    /// Notifies every current subscriber.
    pub async fn publish(&self, event: NotificationEvent) -> Result<PublishReport> {
        self.request(|reply| Command::Publish { event, reply }).await?
    }

    pub async fn button_press(&self) -> Result<PublishReport> {
        self.publish(NotificationEvent::ButtonPress).await
    }

    pub async fn set_slider(&self, value: u8) -> Result<PublishReport> {
        self.publish(NotificationEvent::SliderValue(value)).await
    }

    /// Stops advertising and waits for the task to finish.
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

async fn run<R: PeripheralRadio>(
    mut core: PeripheralCore<R>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<PeripheralEvent>,
) {
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::RegisterService { descriptor, reply }) => {
                    let _ = reply.send(core.register_service(descriptor));
                }
                Some(Command::StartAdvertising { descriptor, reply }) => {
                    let _ = reply.send(core.start_advertising(descriptor));
                }
                Some(Command::StopAdvertising { reply }) => {
                    core.stop_advertising();
                    let _ = reply.send(());
                }
                Some(Command::Publish { event, reply }) => {
                    let _ = reply.send(core.publish(event));
                }
                Some(Command::Shutdown) | None => break,
            },

            event = events.recv(), if events_open => match event {
                Some(event) => core.handle_event(event),
                None => {
                    debug!("Peripheral event stream closed");
                    events_open = false;
                }
            },
        }
    }

    core.shutdown();
    debug!("Peripheral runtime stopped");
}

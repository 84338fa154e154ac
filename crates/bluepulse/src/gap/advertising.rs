//! Peripheral advertising
//!
//! [`AdvertisementBroadcaster`] remembers the caller's intent to advertise
//! and turns it into platform requests whenever the adapter allows it.

use super::adv_data;
use super::types::AdvertisementData;
use crate::adapter::AdapterState;
use crate::error::{Error, Result};
use crate::radio::PeripheralRadio;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdvertisingState {
    #[default]
    Idle,
    /// Requested, waiting for power and a registered service.
    Pending,
    /// Platform request issued, completion outstanding.
    Starting,
    Advertising,
}

impl AdvertisingState {
    pub fn is_active(self) -> bool {
        matches!(self, AdvertisingState::Starting | AdvertisingState::Advertising)
    }
}

#[derive(Debug, Default)]
pub struct AdvertisementBroadcaster {
    state: AdvertisingState,
    payload: Option<Vec<u8>>,
}

impl AdvertisementBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdvertisingState {
        self.state
    }

    /// Raw payload that is, or will be, broadcast.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Records the intent to advertise `data`.
    ///
    /// Nothing is sent to the radio here; [`broadcast`](Self::broadcast) does
    /// that once the adapter is powered on and the service is registered.
    pub fn start(&mut self, data: &AdvertisementData, adapter: AdapterState) -> Result<()> {
        if adapter.is_unavailable() {
            self.state = AdvertisingState::Idle;
            return Err(Error::RadioUnavailable(adapter));
        }

        let payload = adv_data::encode(data)?;
        if self.state.is_active() && self.payload.as_deref() == Some(payload.as_slice()) {
            debug!("Already advertising this payload");
            return Ok(());
        }

        self.payload = Some(payload);
        self.state = AdvertisingState::Pending;
        debug!("Advertising requested (adapter {})", adapter);
        Ok(())
    }

    /// Issues the platform request for a pending advertisement. Returns
    /// `Ok(false)` when nothing is pending.
    pub fn broadcast<R: PeripheralRadio>(&mut self, radio: &mut R) -> Result<bool> {
        if self.state != AdvertisingState::Pending {
            return Ok(false);
        }
        let Some(payload) = self.payload.as_deref() else {
            return Ok(false);
        };

        if let Err(reason) = radio.start_advertising(payload) {
            self.state = AdvertisingState::Idle;
            return Err(Error::Platform(reason));
        }
        self.state = AdvertisingState::Starting;
        Ok(true)
    }

    /// Applies the platform's "advertising started" completion.
    ///
    /// A completion arriving after [`stop`](Self::stop) is answered with a
    /// platform stop. Returns `None` when the completion was not awaited.
    pub fn on_started<R: PeripheralRadio>(
        &mut self,
        result: std::result::Result<(), String>,
        radio: &mut R,
    ) -> Option<Result<()>> {
        if self.state != AdvertisingState::Starting {
            if result.is_ok() {
                debug!("Late advertising start in state {:?}, stopping", self.state);
                radio.stop_advertising();
            }
            return None;
        }

        match result {
            Ok(()) => {
                self.state = AdvertisingState::Advertising;
                info!("Advertising started");
                Some(Ok(()))
            }
            Err(reason) => {
                self.state = AdvertisingState::Idle;
                warn!("Advertising failed to start: {}", reason);
                Some(Err(Error::Platform(reason)))
            }
        }
    }

    /// Idempotent. Returns `true` if the state changed.
    pub fn stop<R: PeripheralRadio>(&mut self, radio: &mut R) -> bool {
        let previous = self.state;
        if previous.is_active() {
            radio.stop_advertising();
        }
        self.state = AdvertisingState::Idle;
        self.payload = None;
        if previous != AdvertisingState::Idle {
            info!("Advertising stopped");
        }
        previous != AdvertisingState::Idle
    }

    /// The radio stopped advertising on its own; resume on the next power-on.
    pub fn on_power_lost(&mut self) -> bool {
        if self.state.is_active() {
            self.state = AdvertisingState::Pending;
            return true;
        }
        false
    }

    /// Drops any intent. Returns the error to surface, if an intent existed.
    pub fn on_unavailable(&mut self, adapter: AdapterState) -> Option<Error> {
        if self.state == AdvertisingState::Idle {
            return None;
        }
        self.state = AdvertisingState::Idle;
        self.payload = None;
        Some(Error::RadioUnavailable(adapter))
    }
}

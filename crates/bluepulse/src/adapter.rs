//! Radio adapter power and availability
//!
//! [`AdapterContext`] is the single source of truth for whether the radio may
//! be used. It is updated by the owning runtime as platform state events are
//! processed, in arrival order, and anyone interested can watch it.

use crate::error::{Error, Result};
use std::fmt;
use tokio::sync::watch;

/// Power/availability state reported by the platform radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterState {
    #[default]
    Unknown,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_powered_on(self) -> bool {
        self == AdapterState::PoweredOn
    }

    /// Unsupported and unauthorized adapters never recover on their own.
    pub fn is_unavailable(self) -> bool {
        matches!(self, AdapterState::Unsupported | AdapterState::Unauthorized)
    }

    /// Maps the state onto the error a radio request would fail with.
    pub fn check_ready(self) -> Result<()> {
        match self {
            AdapterState::PoweredOn => Ok(()),
            AdapterState::Unsupported | AdapterState::Unauthorized => {
                Err(Error::RadioUnavailable(self))
            }
            AdapterState::Unknown | AdapterState::PoweredOff => Err(Error::RadioNotReady(self)),
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterState::Unknown => "unknown",
            AdapterState::Unsupported => "unsupported",
            AdapterState::Unauthorized => "unauthorized",
            AdapterState::PoweredOff => "powered off",
            AdapterState::PoweredOn => "powered on",
        };
        f.write_str(name)
    }
}

/// A change of adapter state, as applied by [`AdapterContext::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterTransition {
    pub from: AdapterState,
    pub to: AdapterState,
}

impl AdapterTransition {
    pub fn powered_on(&self) -> bool {
        !self.from.is_powered_on() && self.to.is_powered_on()
    }

    pub fn powered_off(&self) -> bool {
        self.from.is_powered_on() && !self.to.is_powered_on()
    }

    pub fn became_unavailable(&self) -> bool {
        !self.from.is_unavailable() && self.to.is_unavailable()
    }
}

/// Wraps the platform radio status for one adapter instance.
#[derive(Debug)]
pub struct AdapterContext {
    state: watch::Sender<AdapterState>,
}

impl AdapterContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AdapterState::Unknown);
        Self { state }
    }

    pub fn state(&self) -> AdapterState {
        *self.state.borrow()
    }

    /// Stream of state changes.
    pub fn subscribe(&self) -> watch::Receiver<AdapterState> {
        self.state.subscribe()
    }

    pub fn check_ready(&self) -> Result<()> {
        self.state().check_ready()
    }

    /// Records a platform state report. Returns the transition if the state
    /// actually changed; repeated reports of the same state are absorbed.
    pub fn apply(&self, next: AdapterState) -> Option<AdapterTransition> {
        let from = self.state();
        if from == next {
            return None;
        }
        self.state.send_replace(next);
        Some(AdapterTransition { from, to: next })
    }
}

impl Default for AdapterContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_mapping() {
        assert_eq!(AdapterState::PoweredOn.check_ready(), Ok(()));
        assert_eq!(
            AdapterState::PoweredOff.check_ready(),
            Err(Error::RadioNotReady(AdapterState::PoweredOff))
        );
        assert_eq!(
            AdapterState::Unknown.check_ready(),
            Err(Error::RadioNotReady(AdapterState::Unknown))
        );
        assert_eq!(
            AdapterState::Unauthorized.check_ready(),
            Err(Error::RadioUnavailable(AdapterState::Unauthorized))
        );
    }

    #[test]
    fn test_apply_reports_only_changes() {
        let adapter = AdapterContext::new();
        let mut changes = adapter.subscribe();
        assert_eq!(adapter.state(), AdapterState::Unknown);

        let transition = adapter.apply(AdapterState::PoweredOn).unwrap();
        assert!(transition.powered_on());
        assert!(!transition.powered_off());
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), AdapterState::PoweredOn);

        assert_eq!(adapter.apply(AdapterState::PoweredOn), None);
        assert!(!changes.has_changed().unwrap());

        let transition = adapter.apply(AdapterState::Unsupported).unwrap();
        assert!(transition.powered_off());
        assert!(transition.became_unavailable());
    }
}

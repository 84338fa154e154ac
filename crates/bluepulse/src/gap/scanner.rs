//! Central-side discovery of advertising peripherals

use super::types::{DiscoveredPeer, PeerId};
use crate::adapter::AdapterState;
use crate::error::{Error, Result};
use crate::radio::CentralRadio;
use crate::uuid::Uuid;
use log::{debug, info, trace};
use std::collections::HashSet;

/// How the scanner reacts to advertisements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanStrategy {
    /// Stop at the first peripheral advertising the service and connect to it.
    #[default]
    SelectFirst,
    /// List every peripheral once; never connect on its own.
    CollectAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScannerState {
    #[default]
    Idle,
    /// Requested, waiting for the adapter to power on.
    Pending,
    Scanning,
}

/// What the scanner made of one advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Ignored,
    Duplicate,
    Collected(DiscoveredPeer),
    /// Scanning stopped; the caller should connect to this peer.
    Selected(DiscoveredPeer),
}

#[derive(Debug)]
pub struct ConnectionScanner {
    strategy: ScanStrategy,
    service: Uuid,
    state: ScannerState,
    discovered: Vec<DiscoveredPeer>,
    seen: HashSet<PeerId>,
    selected: Option<PeerId>,
    /// Peers whose session failed since the last explicit scan.
    skipped: HashSet<PeerId>,
}

impl ConnectionScanner {
    pub fn new(strategy: ScanStrategy, service: Uuid) -> Self {
        Self {
            strategy,
            service,
            state: ScannerState::Idle,
            discovered: Vec::new(),
            seen: HashSet::new(),
            selected: None,
            skipped: HashSet::new(),
        }
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScannerState::Scanning
    }

    /// Peers collected since the last [`start`](Self::start), in discovery
    /// order. Always empty for [`ScanStrategy::SelectFirst`].
    pub fn discovered(&self) -> &[DiscoveredPeer] {
        &self.discovered
    }

    pub fn find(&self, id: &PeerId) -> Option<&DiscoveredPeer> {
        self.discovered.iter().find(|peer| peer.id == *id)
    }

    /// Stops [`ScanStrategy::SelectFirst`] from picking `peer` again until
    /// [`forget_skipped`](Self::forget_skipped) is called.
    pub fn skip(&mut self, peer: PeerId) -> bool {
        self.strategy == ScanStrategy::SelectFirst && self.skipped.insert(peer)
    }

    pub fn is_skipped(&self, peer: &PeerId) -> bool {
        self.skipped.contains(peer)
    }

    pub fn forget_skipped(&mut self) {
        self.skipped.clear();
    }

    /// Starts scanning, or remembers the request until the adapter powers on.
    /// Returns `Ok(true)` if the radio scan was started now.
    pub fn start<R: CentralRadio>(&mut self, adapter: AdapterState, radio: &mut R) -> Result<bool> {
        if adapter.is_unavailable() {
            self.state = ScannerState::Idle;
            return Err(Error::RadioUnavailable(adapter));
        }

        if self.strategy == ScanStrategy::CollectAll {
            self.discovered.clear();
            self.seen.clear();
        }
        self.selected = None;

        if self.state == ScannerState::Scanning {
            return Ok(false);
        }
        if !adapter.is_powered_on() {
            debug!("Scan requested while adapter {}, deferring", adapter);
            self.state = ScannerState::Pending;
            return Ok(false);
        }

        self.begin(radio)?;
        Ok(true)
    }

    fn begin<R: CentralRadio>(&mut self, radio: &mut R) -> Result<()> {
        let filter = match self.strategy {
            ScanStrategy::SelectFirst => vec![self.service],
            ScanStrategy::CollectAll => Vec::new(),
        };
        if let Err(reason) = radio.start_scan(&filter) {
            self.state = ScannerState::Idle;
            return Err(Error::Platform(reason));
        }
        self.state = ScannerState::Scanning;
        info!("Scanning started ({:?})", self.strategy);
        Ok(())
    }

    /// Idempotent; also drops a deferred request. Returns `true` if the
    /// state changed.
    pub fn stop<R: CentralRadio>(&mut self, radio: &mut R) -> bool {
        let previous = self.state;
        if previous == ScannerState::Scanning {
            radio.stop_scan();
            info!("Scanning stopped");
        }
        self.state = ScannerState::Idle;
        previous != ScannerState::Idle
    }

    /// Resumes a deferred scan. Returns `Ok(true)` if scanning started.
    pub fn on_power_on<R: CentralRadio>(&mut self, radio: &mut R) -> Result<bool> {
        if self.state != ScannerState::Pending {
            return Ok(false);
        }
        self.begin(radio)?;
        Ok(true)
    }

    /// The radio stopped scanning on its own; resume on the next power-on.
    pub fn on_power_lost(&mut self) -> bool {
        if self.state == ScannerState::Scanning {
            self.state = ScannerState::Pending;
            return true;
        }
        false
    }

    pub fn on_unavailable(&mut self, adapter: AdapterState) -> Option<Error> {
        if self.state == ScannerState::Idle {
            return None;
        }
        self.state = ScannerState::Idle;
        Some(Error::RadioUnavailable(adapter))
    }

    pub fn on_discovered<R: CentralRadio>(&mut self, peer: DiscoveredPeer, radio: &mut R) -> Discovery {
        if self.state != ScannerState::Scanning {
            return Discovery::Ignored;
        }

        match self.strategy {
            ScanStrategy::SelectFirst => {
                if self.selected.is_some() || !peer.advertisement.advertises(&self.service) {
                    return Discovery::Ignored;
                }
                if self.skipped.contains(&peer.id) {
                    trace!("Skipping {} after a failed session", peer.id);
                    return Discovery::Ignored;
                }
                radio.stop_scan();
                self.state = ScannerState::Idle;
                self.selected = Some(peer.id);
                info!("Selected {}", peer);
                Discovery::Selected(peer)
            }
            ScanStrategy::CollectAll => {
                if !self.seen.insert(peer.id) {
                    return Discovery::Duplicate;
                }
                debug!("Discovered {}", peer);
                self.discovered.push(peer.clone());
                Discovery::Collected(peer)
            }
        }
    }
}

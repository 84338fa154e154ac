//! Hand-off from a radio-event context to its consumer
//!
//! A relay has two lanes with different delivery policies:
//!
//! - the discrete lane (unbounded mpsc) delivers every event exactly once, in
//!   order, regardless of how slowly the consumer drains it;
//! - the continuous lane (watch) only keeps the latest value, so a slow
//!   consumer observes a coalesced state.
//!
//! There is exactly one writer (the runtime task) and one reader.

use crate::error::{Error, Result};
use log::trace;
use tokio::sync::{mpsc, watch};

/// Creates a connected relay pair whose continuous lane starts at `initial`.
pub fn relay<D, C>(initial: C) -> (RelaySender<D, C>, RelayReceiver<D, C>) {
    let (discrete_tx, discrete_rx) = mpsc::unbounded_channel();
    let (continuous_tx, continuous_rx) = watch::channel(initial);

    (
        RelaySender {
            discrete: discrete_tx,
            continuous: continuous_tx,
        },
        RelayReceiver {
            discrete: discrete_rx,
            continuous: continuous_rx,
        },
    )
}

/// Writing half, owned by the radio-event context.
#[derive(Debug)]
pub struct RelaySender<D, C> {
    discrete: mpsc::UnboundedSender<D>,
    continuous: watch::Sender<C>,
}

impl<D, C> RelaySender<D, C> {
    /// Queues a discrete event. Never blocks and never merges.
    pub fn emit(&self, event: D) {
        if self.discrete.send(event).is_err() {
            trace!("relay consumer gone, discrete event discarded");
        }
    }

    /// Replaces the continuous value.
    pub fn publish(&self, value: C) {
        self.continuous.send_replace(value);
    }

    /// Modifies the continuous value in place; readers are only woken when
    /// `modify` reports a change.
    pub fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut C) -> bool,
    {
        self.continuous.send_if_modified(modify);
    }

    pub fn latest(&self) -> C
    where
        C: Clone,
    {
        self.continuous.borrow().clone()
    }
}

/// Reading half, held by the consumer.
#[derive(Debug)]
pub struct RelayReceiver<D, C> {
    discrete: mpsc::UnboundedReceiver<D>,
    continuous: watch::Receiver<C>,
}

impl<D, C: Clone> RelayReceiver<D, C> {
    /// Waits for the next discrete event. `None` once the writer is gone and
    /// the lane is drained.
    pub async fn next_event(&mut self) -> Option<D> {
        self.discrete.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<D> {
        self.discrete.try_recv().ok()
    }

    /// Takes every discrete event queued so far.
    pub fn drain_events(&mut self) -> Vec<D> {
        let mut events = Vec::new();
        while let Ok(event) = self.discrete.try_recv() {
            events.push(event);
        }
        events
    }

    /// Current continuous value.
    pub fn latest(&self) -> C {
        self.continuous.borrow().clone()
    }

    /// Waits until the continuous value changes and returns it.
    pub async fn changed(&mut self) -> Result<C> {
        self.continuous.changed().await.map_err(|_| Error::Stopped)?;
        Ok(self.continuous.borrow_and_update().clone())
    }

    /// Waits until the continuous value satisfies `predicate`.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Result<C>
    where
        F: FnMut(&C) -> bool,
    {
        let value = self
            .continuous
            .wait_for(predicate)
            .await
            .map_err(|_| Error::Stopped)?;
        Ok(value.clone())
    }
}

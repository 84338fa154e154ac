//! GATT Server implementation
//!
//! Hosts the single notify characteristic, tracks which centrals subscribed
//! to it and fans events out to them.

use super::types::{ServiceDescriptor, SubscriberId};
use crate::channel::{NotificationEvent, WireFormat};
use crate::error::{Error, Result};
use crate::radio::PeripheralRadio;
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Centrals currently subscribed to the characteristic. Insert and remove
/// are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberSet {
    members: BTreeSet<SubscriberId>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: SubscriberId) -> bool {
        self.members.insert(id)
    }

    /// Returns `false` if `id` was not present.
    pub fn remove(&mut self, id: &SubscriberId) -> bool {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubscriberId> {
        self.members.iter()
    }

    /// Removes every member, returning them in order.
    pub fn clear(&mut self) -> Vec<SubscriberId> {
        std::mem::take(&mut self.members).into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    /// `add_service` issued, completion outstanding.
    Pending,
    Registered,
}

/// Outcome of a single [`GattServer::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// A GATT server exposing one notify characteristic
#[derive(Debug)]
pub struct GattServer {
    descriptor: Option<ServiceDescriptor>,
    wire_format: WireFormat,
    registration: RegistrationState,
    subscribers: SubscriberSet,
    delivered_total: u64,
    failed_total: u64,
}

impl GattServer {
    pub fn new(wire_format: WireFormat) -> Self {
        Self {
            descriptor: None,
            wire_format,
            registration: RegistrationState::Unregistered,
            subscribers: SubscriberSet::new(),
            delivered_total: 0,
            failed_total: 0,
        }
    }

    pub fn descriptor(&self) -> Option<&ServiceDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn registration(&self) -> RegistrationState {
        self.registration
    }

    pub fn is_registered(&self) -> bool {
        self.registration == RegistrationState::Registered
    }

    /// Pins the service layout. A server hosts exactly one layout for its
    /// whole lifetime.
    pub fn set_descriptor(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        match self.descriptor {
            Some(existing) if existing != descriptor => Err(Error::ServiceConflict),
            _ => {
                self.descriptor = Some(descriptor);
                Ok(())
            }
        }
    }

    /// Asks the platform to install the service. Returns `Ok(false)` when it
    /// is already installed or being installed.
    pub fn register_service<R: PeripheralRadio>(
        &mut self,
        descriptor: ServiceDescriptor,
        radio: &mut R,
    ) -> Result<bool> {
        self.set_descriptor(descriptor)?;
        if self.registration != RegistrationState::Unregistered {
            return Ok(false);
        }

        radio
            .add_service(&descriptor.service_definition())
            .map_err(Error::Platform)?;
        self.registration = RegistrationState::Pending;
        debug!("Registering service {}", descriptor.service_uuid);
        Ok(true)
    }

    /// Applies the platform's completion of `add_service`. Returns `Ok(true)`
    /// when the service became registered; completions nobody waits for are
    /// ignored.
    pub fn on_service_added(&mut self, result: std::result::Result<(), String>) -> Result<bool> {
        if self.registration != RegistrationState::Pending {
            debug!("Ignoring unexpected service registration completion");
            return Ok(false);
        }

        match result {
            Ok(()) => {
                self.registration = RegistrationState::Registered;
                info!("Service registered");
                Ok(true)
            }
            Err(reason) => {
                self.registration = RegistrationState::Unregistered;
                warn!("Service registration failed: {}", reason);
                Err(Error::Platform(reason))
            }
        }
    }

    /// Returns `true` if the subscriber is new.
    pub fn on_subscribe(&mut self, id: SubscriberId) -> bool {
        let added = self.subscribers.insert(id);
        if added {
            info!("Central {} subscribed ({} total)", id, self.subscribers.len());
        }
        added
    }

    /// Returns `true` if the subscriber was known.
    pub fn on_unsubscribe(&mut self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id);
        if removed {
            info!("Central {} unsubscribed ({} total)", id, self.subscribers.len());
        } else {
            debug!("Unsubscribe from unknown central {}", id);
        }
        removed
    }

    /// Encodes `event` and notifies every current subscriber.
    ///
    /// Deliveries are independent: a failed notification is counted and
    /// logged, the remaining subscribers are still notified and the set is
    /// left untouched.
    pub fn publish<R: PeripheralRadio>(
        &mut self,
        event: NotificationEvent,
        radio: &mut R,
    ) -> Result<PublishReport> {
        let payload = self.wire_format.encode(event)?;
        let mut report = PublishReport::default();

        let characteristic = match &self.descriptor {
            Some(descriptor) if !self.subscribers.is_empty() => descriptor.characteristic_uuid,
            _ => return Ok(report),
        };

        for subscriber in self.subscribers.iter() {
            match radio.notify(subscriber, &characteristic, &payload) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    warn!("Failed to notify {}: {}", subscriber, reason);
                    report.failed += 1;
                }
            }
        }

        self.delivered_total += report.delivered as u64;
        self.failed_total += report.failed as u64;
        debug!(
            "Published {} to {} subscribers ({} failed)",
            event, report.delivered, report.failed
        );
        Ok(report)
    }

    /// Forgets the installed service and every subscriber, as happens when
    /// the adapter powers off. Returns the subscribers that were dropped.
    pub fn reset(&mut self) -> Vec<SubscriberId> {
        self.registration = RegistrationState::Unregistered;
        self.subscribers.clear()
    }

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn delivered_total(&self) -> u64 {
        self.delivered_total
    }

    pub fn failed_total(&self) -> u64 {
        self.failed_total
    }
}

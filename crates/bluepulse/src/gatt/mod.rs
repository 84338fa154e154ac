//! GATT (Generic Attribute Profile) roles
//!
//! The server side hosts the notify characteristic and fans events out to
//! subscribers; the client side discovers it on a remote peripheral and
//! decodes what arrives.

pub mod client;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{ConnectionSession, GattClient, LinkOutcome, ObservedState, SessionId, SessionState};
pub use server::{GattServer, PublishReport, RegistrationState, SubscriberSet};
pub use types::{
    AttributePermissions, CharacteristicInfo, CharacteristicProperties, DiscoveryStage,
    GattCharacteristic, GattService, ServiceDescriptor, SubscriberId,
};

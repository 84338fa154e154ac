//! Bluepulse - a BLE peripheral/central link for one-byte control events
//!
//! A peripheral hosts one service with one notify characteristic and pushes
//! button presses and slider values to every subscribed central. A central
//! scans for that service, walks the discovery chain and turns the
//! notifications it receives into observable state.
//!
//! Platform radios plug in through the traits in [`radio`]. Each role runs
//! in its own task ([`Peripheral`], [`Central`]) and reports back through a
//! [`relay`] that never drops discrete events and coalesces level state.
//! [`sim`] provides an in-process radio for both roles.

pub mod adapter;
pub mod central;
pub mod channel;
pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod peripheral;
pub mod radio;
pub mod relay;
pub mod sim;
pub mod uuid;

#[cfg(test)]
mod testing;

// Re-export common types for convenience
pub use adapter::{AdapterContext, AdapterState};
pub use central::{Central, CentralSnapshot, CentralUpdate, CentralUpdates};
pub use channel::{NotificationEvent, WireFormat};
pub use config::{CentralConfig, PeripheralConfig};
pub use error::{Error, Result};
pub use gap::{AdvertisementData, DiscoveredPeer, PeerId, ScanStrategy};
pub use gatt::{ObservedState, ServiceDescriptor, SessionState, SubscriberId};
pub use peripheral::{Peripheral, PeripheralSnapshot, PeripheralUpdate, PeripheralUpdates};
pub use uuid::Uuid;

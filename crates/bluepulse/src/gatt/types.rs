//! Common types for GATT operations
//!
//! This module defines the service layout both roles agree on and the
//! identifiers used on either side of a link.

use crate::uuid::Uuid;
use bitflags::bitflags;
use std::fmt;

/// 16-bit alias of the demo service.
pub const DEMO_SERVICE_UUID: u16 = 0xABCD;
/// 16-bit alias of the demo notify characteristic.
pub const DEMO_CHARACTERISTIC_UUID: u16 = 0x1234;
/// Local name the peripheral advertises.
pub const DEMO_LOCAL_NAME: &str = "MyPeripheral";

bitflags! {
    /// Characteristic properties as defined in the Bluetooth specification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

bitflags! {
    /// Access permissions on the characteristic value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributePermissions: u8 {
        const READABLE = 0x01;
        const WRITEABLE = 0x02;
        const READ_ENCRYPTION_REQUIRED = 0x04;
        const WRITE_ENCRYPTION_REQUIRED = 0x08;
    }
}

/// The one service / one characteristic layout shared by both roles.
///
/// Discovery only succeeds when both sides use identical UUIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub local_name: &'static str,
}

impl ServiceDescriptor {
    /// Service `ABCD`, characteristic `1234`, advertised as `MyPeripheral`.
    pub const DEMO: ServiceDescriptor = ServiceDescriptor::new(
        Uuid::from_u16(DEMO_SERVICE_UUID),
        Uuid::from_u16(DEMO_CHARACTERISTIC_UUID),
        DEMO_LOCAL_NAME,
    );

    pub const fn new(service_uuid: Uuid, characteristic_uuid: Uuid, local_name: &'static str) -> Self {
        Self {
            service_uuid,
            characteristic_uuid,
            local_name,
        }
    }

    /// Primary service holding a single notify-only, readable characteristic.
    pub fn service_definition(&self) -> GattService {
        GattService {
            uuid: self.service_uuid,
            is_primary: true,
            characteristics: vec![GattCharacteristic {
                uuid: self.characteristic_uuid,
                properties: CharacteristicProperties::NOTIFY,
                permissions: AttributePermissions::READABLE,
            }],
        }
    }
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self::DEMO
    }
}

/// A characteristic as installed on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub permissions: AttributePermissions,
}

/// A service as installed on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub is_primary: bool,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| &c.uuid == uuid)
    }
}

/// A characteristic as reported to a client during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

impl From<&GattCharacteristic> for CharacteristicInfo {
    fn from(characteristic: &GattCharacteristic) -> Self {
        Self {
            uuid: characteristic.uuid,
            properties: characteristic.properties,
        }
    }
}

/// Identifies a central that enabled notifications on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new_random() -> Self {
        Self(Uuid::new_random_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Step of the client discovery chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryStage {
    Service,
    Characteristic,
    Subscription,
}

impl fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStage::Service => f.write_str("service"),
            DiscoveryStage::Characteristic => f.write_str("characteristic"),
            DiscoveryStage::Subscription => f.write_str("subscription"),
        }
    }
}

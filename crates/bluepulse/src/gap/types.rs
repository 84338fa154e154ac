use crate::gap::constants::*;
use crate::uuid::Uuid;
use std::fmt;

/// Opaque identifier of a remote peripheral, stable for the lifetime of the
/// platform's view of that device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
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

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Advertising payload fields this crate emits and understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementData {
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Option<Vec<u8>>,
    pub tx_power: Option<i8>,
}

impl AdvertisementData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        if !self.service_uuids.contains(&uuid) {
            self.service_uuids.push(uuid);
        }
        self
    }

    pub fn with_manufacturer_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.manufacturer_data = Some(data.into());
        self
    }

    pub fn with_tx_power(mut self, level: i8) -> Self {
        self.tx_power = Some(level);
        self
    }

    pub fn advertises(&self, service: &Uuid) -> bool {
        self.service_uuids.contains(service)
    }

    /// Key/value view of the payload, in the order the fields are encoded.
    pub fn entries(&self) -> Vec<(AdKey, AdValue)> {
        let mut entries = Vec::new();
        if !self.service_uuids.is_empty() {
            entries.push((AdKey::ServiceUuids, AdValue::Uuids(self.service_uuids.clone())));
        }
        if let Some(name) = &self.local_name {
            entries.push((AdKey::LocalName, AdValue::Text(name.clone())));
        }
        if let Some(level) = self.tx_power {
            entries.push((AdKey::TxPowerLevel, AdValue::Integer(level as i64)));
        }
        if let Some(data) = &self.manufacturer_data {
            entries.push((AdKey::ManufacturerData, AdValue::Bytes(data.clone())));
        }
        entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdKey {
    LocalName,
    ServiceUuids,
    TxPowerLevel,
    ManufacturerData,
}

impl AdKey {
    pub fn ad_type(self) -> u8 {
        match self {
            AdKey::LocalName => ADV_TYPE_COMPLETE_LOCAL_NAME,
            AdKey::ServiceUuids => ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE,
            AdKey::TxPowerLevel => ADV_TYPE_TX_POWER_LEVEL,
            AdKey::ManufacturerData => ADV_TYPE_MANUFACTURER_SPECIFIC,
        }
    }
}

impl fmt::Display for AdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdKey::LocalName => "local name",
            AdKey::ServiceUuids => "service UUIDs",
            AdKey::TxPowerLevel => "tx power",
            AdKey::ManufacturerData => "manufacturer data",
        };
        f.write_str(name)
    }
}

/// A decoded advertisement value.
///
/// Raw bytes display as space separated upper-case hex pairs (`48 65 6C`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdValue {
    Text(String),
    Bytes(Vec<u8>),
    Uuids(Vec<Uuid>),
    Integer(i64),
}

impl fmt::Display for AdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdValue::Text(text) => f.write_str(text),
            AdValue::Bytes(bytes) => {
                let pairs: Vec<String> = bytes.iter().map(|b| hex::encode_upper([*b])).collect();
                f.write_str(&pairs.join(" "))
            }
            AdValue::Uuids(uuids) => {
                let aliases: Vec<String> = uuids.iter().map(|u| u.alias()).collect();
                write!(f, "[{}]", aliases.join(", "))
            }
            AdValue::Integer(value) => write!(f, "{}", value),
        }
    }
}

/// One observation of an advertising peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub id: PeerId,
    pub display_name: String,
    pub rssi: i16,
    pub advertisement: AdvertisementData,
}

impl DiscoveredPeer {
    /// Falls back to [`UNKNOWN_PEER_NAME`] when the advertisement has no name.
    pub fn new(id: PeerId, rssi: i16, advertisement: AdvertisementData) -> Self {
        let display_name = advertisement
            .local_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_PEER_NAME.to_string());
        Self {
            id,
            display_name,
            rssi,
            advertisement,
        }
    }
}

impl fmt::Display for DiscoveredPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) RSSI {}", self.display_name, self.id, self.rssi)
    }
}

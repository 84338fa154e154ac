//! Runtime configuration for both roles

use crate::channel::WireFormat;
use crate::gap::ScanStrategy;
use crate::gatt::ServiceDescriptor;
use std::time::Duration;

/// Upper bound for connect plus discovery before a session is failed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeripheralConfig {
    pub wire_format: WireFormat,
    /// Extra bytes carried in the advertisement, if any.
    pub manufacturer_data: Option<Vec<u8>>,
}

impl PeripheralConfig {
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn with_manufacturer_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.manufacturer_data = Some(data.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralConfig {
    pub descriptor: ServiceDescriptor,
    pub strategy: ScanStrategy,
    pub wire_format: WireFormat,
    /// `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Go back to scanning after a failed session instead of idling.
    pub rescan_on_failure: bool,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            descriptor: ServiceDescriptor::DEMO,
            strategy: ScanStrategy::SelectFirst,
            wire_format: WireFormat::Compact,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            rescan_on_failure: true,
        }
    }
}

impl CentralConfig {
    pub fn with_descriptor(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_rescan_on_failure(mut self, rescan: bool) -> Self {
        self.rescan_on_failure = rescan;
        self
    }
}

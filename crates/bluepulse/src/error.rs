//! Error types for the bluepulse library
//!
//! Radio and protocol anomalies are never fatal. Transient conditions are
//! retried by the component that owns them, permanent and discovery conditions
//! surface as state transitions, and malformed payloads are dropped.

use crate::adapter::AdapterState;
use crate::channel::{DecodeError, EncodeError};
use crate::gap::PeerId;
use crate::gatt::DiscoveryStage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The adapter is unsupported or unauthorized. Never retried.
    #[error("Radio unavailable (adapter {0})")]
    RadioUnavailable(AdapterState),

    /// The adapter is not powered on yet. Retried on power-on.
    #[error("Radio not ready (adapter {0})")]
    RadioNotReady(AdapterState),

    #[error("Discovery failed: {0} not found")]
    DiscoveryFailed(DiscoveryStage),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),

    #[error("Session superseded by a newer request")]
    SessionSuperseded,

    #[error("Cannot encode event: {0}")]
    Encode(#[from] EncodeError),

    #[error("Advertising payload of {0} bytes exceeds the legacy limit")]
    AdvertisementTooLarge(usize),

    #[error("A different service is already registered")]
    ServiceConflict,

    #[error("Peer {0} was not discovered")]
    UnknownPeer(PeerId),

    #[error("Connection attempt timed out")]
    Timeout,

    #[error("Platform error: {0}")]
    Platform(String),

    /// The runtime task has stopped and can no longer accept requests.
    #[error("Runtime stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, Error>;

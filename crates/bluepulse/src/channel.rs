//! Notification event codec shared by both roles
//!
//! The default [`WireFormat::Compact`] format is a single byte:
//!
//! | Value         | Meaning                     |
//! |---------------|-----------------------------|
//! | `0x00`        | invalid / reserved          |
//! | `0x01`        | button press (edge event)   |
//! | `0x02`-`0xFF` | slider value, raw magnitude |
//!
//! `0x01` is also the bottom of the slider range, so a slider value of 1
//! cannot be sent in this format. [`WireFormat::Tagged`] prefixes a tag byte
//! and carries the full range, but only peers configured the same way
//! understand it.

use std::fmt;
use thiserror::Error;

pub const RESERVED_VALUE: u8 = 0x00;
pub const BUTTON_PRESS_VALUE: u8 = 0x01;
/// Smallest slider value the compact format can carry.
pub const COMPACT_SLIDER_MIN: u8 = 0x02;

pub const TAG_BUTTON_PRESS: u8 = 0x01;
pub const TAG_SLIDER_VALUE: u8 = 0x02;

/// Payload semantics layered over the raw wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    /// Edge-triggered: every occurrence counts.
    ButtonPress,
    /// Level-triggered: only the latest value matters.
    SliderValue(u8),
}

impl NotificationEvent {
    /// Discrete events must never be coalesced on their way to a consumer.
    pub fn is_discrete(&self) -> bool {
        matches!(self, NotificationEvent::ButtonPress)
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::ButtonPress => f.write_str("button press"),
            NotificationEvent::SliderValue(value) => write!(f, "slider {}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireFormat {
    /// One byte, compatible with the original two-role demo.
    #[default]
    Compact,
    /// Two bytes: tag, value.
    Tagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a {expected} byte payload, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("reserved value 0x{0:02x}")]
    Reserved(u8),

    #[error("unknown tag 0x{0:02x}")]
    UnknownTag(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("slider value {value} cannot be carried by the {format:?} format")]
    SliderOutOfRange { value: u8, format: WireFormat },
}

impl WireFormat {
    pub const fn payload_len(self) -> usize {
        match self {
            WireFormat::Compact => 1,
            WireFormat::Tagged => 2,
        }
    }

    pub fn encode(self, event: NotificationEvent) -> Result<Vec<u8>, EncodeError> {
        match (self, event) {
            (WireFormat::Compact, NotificationEvent::ButtonPress) => Ok(vec![BUTTON_PRESS_VALUE]),
            (WireFormat::Compact, NotificationEvent::SliderValue(value)) => {
                if value < COMPACT_SLIDER_MIN {
                    return Err(EncodeError::SliderOutOfRange {
                        value,
                        format: self,
                    });
                }
                Ok(vec![value])
            }
            (WireFormat::Tagged, NotificationEvent::ButtonPress) => {
                Ok(vec![TAG_BUTTON_PRESS, RESERVED_VALUE])
            }
            (WireFormat::Tagged, NotificationEvent::SliderValue(value)) => {
                if value == RESERVED_VALUE {
                    return Err(EncodeError::SliderOutOfRange {
                        value,
                        format: self,
                    });
                }
                Ok(vec![TAG_SLIDER_VALUE, value])
            }
        }
    }

    pub fn decode(self, payload: &[u8]) -> Result<NotificationEvent, DecodeError> {
        let expected = self.payload_len();
        if payload.len() != expected {
            return Err(DecodeError::WrongLength {
                expected,
                actual: payload.len(),
            });
        }

        match self {
            WireFormat::Compact => match payload[0] {
                RESERVED_VALUE => Err(DecodeError::Reserved(RESERVED_VALUE)),
                BUTTON_PRESS_VALUE => Ok(NotificationEvent::ButtonPress),
                value => Ok(NotificationEvent::SliderValue(value)),
            },
            WireFormat::Tagged => match (payload[0], payload[1]) {
                (TAG_BUTTON_PRESS, _) => Ok(NotificationEvent::ButtonPress),
                (TAG_SLIDER_VALUE, RESERVED_VALUE) => Err(DecodeError::Reserved(RESERVED_VALUE)),
                (TAG_SLIDER_VALUE, value) => Ok(NotificationEvent::SliderValue(value)),
                (tag, _) => Err(DecodeError::UnknownTag(tag)),
            },
        }
    }
}

/// Encodes with the compact single-byte format.
pub fn encode(event: NotificationEvent) -> Result<Vec<u8>, EncodeError> {
    WireFormat::Compact.encode(event)
}

/// Decodes with the compact single-byte format.
pub fn decode(payload: &[u8]) -> Result<NotificationEvent, DecodeError> {
    WireFormat::Compact.decode(payload)
}

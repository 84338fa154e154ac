//! Simulated radio backend
//!
//! [`SimAir`] is a shared medium; [`SimPeripheral`] and [`SimCentral`]
//! implement the radio traits on top of it and report completions on the
//! event channels handed out alongside them. Tests and the command line tool
//! use it to run both roles in one process.

mod air;
mod radio;


pub use air::SimAir;
pub use radio::{SimCentral, SimPeripheral};

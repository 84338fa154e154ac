//! GAP (Generic Access Profile) roles: advertising and discovery

pub mod adv_data;
pub mod advertising;
pub mod constants;
pub mod scanner;
pub mod types;


pub use advertising::{AdvertisementBroadcaster, AdvertisingState};
pub use constants::*;
pub use scanner::{ConnectionScanner, Discovery, ScanStrategy, ScannerState};
pub use types::*;

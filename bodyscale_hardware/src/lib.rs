//! Concrete scale transports.
//!
//! `SimulatedLink` is always available and needs no radio. The `ble` feature
//! adds `BleLink`, which talks to a real scale through btleplug.

pub mod error;
pub mod sim;

#[cfg(feature = "ble")]
pub mod ble;

#[cfg(feature = "ble")]
pub use ble::BleLink;
pub use error::LinkError;
pub use sim::{SimScale, SimulatedLink};

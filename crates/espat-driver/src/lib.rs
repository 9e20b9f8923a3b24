//! AT protocol driver for ESP-AT Wi-Fi co-processors.
//!
//! [`AtDriver`] turns operations such as joining an access point or
//! opening a TCP session into validated command lines on a
//! [`SerialChannel`](espat_transport::SerialChannel). Multi-phase commands
//! (`AT+CIPSTART`, `AT+CIPSEND`) are sequenced with fixed settle delays;
//! replies are surfaced by the channel's response sink, never parsed.

pub mod config;
pub mod delay;
pub mod driver;
pub mod emulator;
pub mod error;
pub mod shared;

pub use config::DriverConfig;
pub use delay::{Delay, ThreadDelay};
pub use driver::{AtDriver, SessionState};
pub use emulator::Emulator;
pub use error::{DriverError, Result};
pub use shared::SharedDriver;

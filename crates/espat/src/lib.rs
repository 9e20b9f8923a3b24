//! Host-side driver for ESP-AT Wi-Fi co-processors.
//!
//! espat talks to an ESP32-class module over a byte-serial link using the
//! textual AT command protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: UART abstraction, interrupt plumbing, response sinks
//! - [`command`]: validated command encoding and response line splitting
//! - [`driver`]: the AT protocol driver (behind `driver` feature)

/// Re-export transport types.
pub mod transport {
    pub use espat_transport::*;
}

/// Re-export command types.
pub mod command {
    pub use espat_command::*;
}

/// Re-export driver types (requires `driver` feature).
#[cfg(feature = "driver")]
pub mod driver {
    pub use espat_driver::*;
}

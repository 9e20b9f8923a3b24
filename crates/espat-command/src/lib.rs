//! Validated AT command encoding for ESP-AT co-processors.
//!
//! Every command is described once in a static [`CommandDescriptor`] table.
//! [`Command`] values carry typed parameters that are range-checked before
//! any byte is produced:
//! - [`encode_command`] writes `AT+...` without the line terminator
//! - [`decode_command`] parses a line back, for simulators and tests
//! - [`LineAccumulator`] splits co-processor output into lines
//!
//! No I/O happens here.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod lines;
pub mod params;

pub use codec::{
    decode_command, encode_command, encode_line, split_command, Command, Param, RawCommand,
    MAX_SEND_LEN, TERMINATOR,
};
pub use descriptor::{CommandDescriptor, Form, DESCRIPTORS};
pub use error::{DecodeError, Result, ValidationError};
pub use lines::{LineAccumulator, ResponseLine, MAX_LINE_LEN};
pub use params::{
    check_text, Bssid, DhcpMode, Encryption, SessionParams, SessionProtocol, SoftApConfig,
    WifiMode, MAX_HOST_LEN, MAX_KEEPALIVE_SECS, MAX_PASSWORD_LEN, MAX_SSID_LEN,
    MIN_SOFTAP_PASSWORD_LEN,
};

//! Interrupt-driven byte transport for AT co-processor links.
//!
//! This is the lowest layer of espat. It owns the UART that connects the host
//! to the co-processor:
//! - a busy-polled send path that respects the hardware's 16-byte FIFO
//! - an interrupt-driven receive path that drains the FIFO into a
//!   [`ResponseSink`]
//!
//! Hardware access sits behind [`UartHardware`] and [`InterruptController`]
//! so the protocol layers above run unchanged against [`SimUart`] in tests
//! and [`HostUart`] on a development machine.

pub mod channel;
pub mod error;
pub mod host;
pub mod irq;
pub mod observer;
pub mod sim;
pub mod traits;

pub use channel::{ReceivePort, SerialChannel, TransportConfig, CRLF, RX_BURST_MAX};
pub use error::{InitError, InitStep, Result, TransportError};
pub use host::{HostUart, DEFAULT_BAUD};
pub use irq::{IrqLine, SoftInterruptController};
pub use observer::{
    response_channel, ChannelSink, ResponseSink, Responses, TracingSink,
};
pub use sim::{Responder, SimUart};
pub use traits::{InterruptController, InterruptHandler, UartEvent, UartHardware, TX_CHUNK_MAX};

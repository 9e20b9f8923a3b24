use std::io;

/// Largest chunk a single [`UartHardware::send`] call accepts.
///
/// Matches the transmit FIFO depth of the AXI UART Lite class of devices.
pub const TX_CHUNK_MAX: usize = 16;

/// Register-level view of the UART wired to the co-processor.
///
/// Methods take `&self`: the hardware is a shared register block, and the
/// receive side is polled from interrupt context while the send side is
/// driven from the caller's context.
pub trait UartHardware: Send + Sync {
    /// Bind the hardware to its device id and reset the FIFOs.
    fn configure(&self, device_id: u32) -> io::Result<()>;

    /// Whether the transmitter is still shifting out a previous chunk.
    ///
    /// Always read from the hardware, never cached.
    fn is_sending(&self) -> bool;

    /// Queue up to [`TX_CHUNK_MAX`] bytes. Returns the number accepted.
    fn send(&self, chunk: &[u8]) -> io::Result<usize>;

    /// Whether the receive FIFO is empty.
    fn is_receive_empty(&self) -> bool;

    /// Pop one byte from the receive FIFO.
    ///
    /// Only meaningful when [`is_receive_empty`](Self::is_receive_empty)
    /// returned `false`.
    fn recv_byte(&self) -> u8;

    /// Enable the UART's interrupt output.
    fn enable_interrupt(&self) -> io::Result<()>;
}

/// Events the UART raises on its interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent {
    /// At least one byte is waiting in the receive FIFO.
    ReceiveData,
    /// The transmit FIFO drained.
    SendComplete,
}

/// Handler installed on an interrupt line.
pub type InterruptHandler = Box<dyn FnMut(UartEvent) + Send>;

/// Platform interrupt controller.
pub trait InterruptController {
    fn initialize(&mut self) -> io::Result<()>;

    /// Attach `handler` to `irq`. Replaces any previous handler.
    fn connect(&mut self, irq: u32, handler: InterruptHandler) -> io::Result<()>;

    /// Start delivering interrupts.
    fn start(&mut self) -> io::Result<()>;

    /// Unmask a single line.
    fn enable(&mut self, irq: u32);
}

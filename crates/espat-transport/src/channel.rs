use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{InitError, InitStep, Result, TransportError};
use crate::observer::ResponseSink;
use crate::traits::{InterruptController, UartEvent, UartHardware, TX_CHUNK_MAX};

/// Bytes forwarded to the sink per call while draining the receive FIFO.
pub const RX_BURST_MAX: usize = 256;

/// Line terminator sent after every command body.
pub const CRLF: &[u8; 2] = b"\r\n";

/// Configuration for the send path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Give up after this many busy polls before a single send.
    /// `None` spins forever, as the bare-metal driver does.
    pub spin_limit: Option<u64>,
}

/// Receive-only view of the UART, handed to the interrupt handler.
///
/// It has no send methods, so code running in interrupt context cannot
/// re-enter the transmit spin-wait.
pub struct ReceivePort<H> {
    hw: Arc<H>,
}

impl<H: UartHardware> ReceivePort<H> {
    pub fn new(hw: Arc<H>) -> Self {
        Self { hw }
    }

    /// Drain the receive FIFO into `sink` until the hardware reports empty.
    ///
    /// Each sink call carries at most [`RX_BURST_MAX`] bytes. Returns the
    /// number of bytes drained.
    pub fn drain<S: ResponseSink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut burst = [0u8; RX_BURST_MAX];
        let mut len = 0usize;
        let mut total = 0usize;

        while !self.hw.is_receive_empty() {
            burst[len] = self.hw.recv_byte();
            len += 1;
            if len == RX_BURST_MAX {
                sink.on_receive(&burst);
                total += len;
                len = 0;
            }
        }

        if len > 0 {
            sink.on_receive(&burst[..len]);
            total += len;
        }
        total
    }
}

/// The serial link to the co-processor.
///
/// Created once by [`initialize`](Self::initialize). Sending takes `&mut self`
/// so only one writer can drive the link at a time.
pub struct SerialChannel<H> {
    hw: Arc<H>,
    device_id: u32,
    config: TransportConfig,
}

impl<H: UartHardware + 'static> SerialChannel<H> {
    /// Configure the UART, wire it to `irq` on `controller`, and arm the
    /// receive interrupt.
    ///
    /// Every received-data interrupt drains the FIFO into `sink`.
    /// Send-complete interrupts are ignored.
    pub fn initialize<C, S>(
        hw: Arc<H>,
        device_id: u32,
        controller: &mut C,
        irq: u32,
        mut sink: S,
    ) -> std::result::Result<Self, InitError>
    where
        C: InterruptController + ?Sized,
        S: ResponseSink + 'static,
    {
        hw.configure(device_id)
            .map_err(|e| InitError::new(InitStep::ConfigureUart, e))?;
        debug!(device_id, "uart configured");

        controller
            .initialize()
            .map_err(|e| InitError::new(InitStep::InitController, e))?;

        let port = ReceivePort::new(Arc::clone(&hw));
        controller
            .connect(
                irq,
                Box::new(move |event| match event {
                    UartEvent::ReceiveData => {
                        let drained = port.drain(&mut sink);
                        trace!(drained, "receive interrupt");
                    }
                    UartEvent::SendComplete => {}
                }),
            )
            .map_err(|e| InitError::new(InitStep::ConnectHandler, e))?;

        controller
            .start()
            .map_err(|e| InitError::new(InitStep::StartController, e))?;
        controller.enable(irq);

        hw.enable_interrupt()
            .map_err(|e| InitError::new(InitStep::ArmInterrupt, e))?;

        info!(device_id, irq, "uart link ready");

        Ok(Self {
            hw,
            device_id,
            config: TransportConfig::default(),
        })
    }
}

impl<H: UartHardware> SerialChannel<H> {
    /// Replace the send-path configuration.
    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Transmit `buf`.
    ///
    /// Buffers that fit the hardware FIFO go out in one call. Longer buffers
    /// fall back to the byte-at-a-time path.
    pub fn send_bytes(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() <= TX_CHUNK_MAX {
            self.wait_idle()?;
            self.send_chunk(buf)
        } else {
            self.send_bytes_safe(buf)
        }
    }

    /// Transmit `buf` one byte per hardware call, waiting for the
    /// transmitter before each byte. Works for any length.
    pub fn send_bytes_safe(&mut self, buf: &[u8]) -> Result<()> {
        for byte in buf.chunks(1) {
            self.wait_idle()?;
            self.send_chunk(byte)?;
        }
        Ok(())
    }

    /// Transmit the two-byte line terminator as one chunk.
    pub fn send_terminator(&mut self) -> Result<()> {
        self.wait_idle()?;
        self.send_chunk(CRLF)
    }

    /// Whether the transmitter is busy right now.
    pub fn is_busy(&self) -> bool {
        self.hw.is_sending()
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Shared handle to the underlying hardware.
    pub fn hardware(&self) -> &Arc<H> {
        &self.hw
    }

    fn wait_idle(&self) -> Result<()> {
        let mut spins = 0u64;
        while self.hw.is_sending() {
            spins += 1;
            if let Some(limit) = self.config.spin_limit {
                if spins >= limit {
                    return Err(TransportError::Stalled { spins });
                }
            }
            std::hint::spin_loop();
        }
        Ok(())
    }

    fn send_chunk(&self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let sent = self.hw.send(chunk)?;
        trace!(len = chunk.len(), sent, "uart send");
        if sent != chunk.len() {
            return Err(TransportError::ShortWrite {
                sent,
                expected: chunk.len(),
            });
        }
        Ok(())
    }
}

impl<H> std::fmt::Debug for SerialChannel<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("device_id", &self.device_id)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::irq::SoftInterruptController;
    use crate::observer::response_channel;
    use crate::sim::SimUart;

    const IRQ: u32 = 1;

    fn channel() -> (Arc<SimUart>, SoftInterruptController, SerialChannel<SimUart>) {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::new());
        let channel =
            SerialChannel::initialize(Arc::clone(&uart), 7, &mut intc, IRQ, |_: &[u8]| {})
                .expect("init should succeed");
        (uart, intc, channel)
    }

    #[test]
    fn short_buffer_is_one_hardware_call() {
        let (uart, _intc, mut channel) = channel();
        channel.send_bytes(b"AT+GMR").unwrap();

        assert_eq!(uart.transmitted(), b"AT+GMR");
        assert_eq!(uart.send_calls(), vec![6]);
    }

    #[test]
    fn sixteen_bytes_still_fit_one_call() {
        let (uart, _intc, mut channel) = channel();
        channel.send_bytes(&[b'x'; TX_CHUNK_MAX]).unwrap();
        assert_eq!(uart.send_calls(), vec![TX_CHUNK_MAX]);
    }

    #[test]
    fn long_buffer_goes_byte_by_byte() {
        let (uart, _intc, mut channel) = channel();
        let line = b"AT+CWJAP=\"MyNet\",\"pass1234\"";
        channel.send_bytes(line).unwrap();

        assert_eq!(uart.transmitted(), line);
        assert_eq!(uart.send_calls(), vec![1; line.len()]);
    }

    #[test]
    fn safe_path_is_always_single_bytes() {
        let (uart, _intc, mut channel) = channel();
        channel.send_bytes_safe(b"AT").unwrap();
        assert_eq!(uart.send_calls(), vec![1, 1]);
    }

    #[test]
    fn terminator_is_one_call() {
        let (uart, _intc, mut channel) = channel();
        channel.send_bytes(b"AT").unwrap();
        channel.send_terminator().unwrap();
        assert_eq!(uart.transmitted(), b"AT\r\n");
        assert_eq!(uart.send_calls(), vec![2, 2]);
    }

    #[test]
    fn busy_flag_is_polled_before_sending() {
        let (uart, _intc, mut channel) = channel();
        uart.set_busy_polls(5);
        channel.send_bytes(b"AT").unwrap();

        assert_eq!(uart.transmitted(), b"AT");
        assert!(uart.busy_polls_observed() >= 5);
        assert!(!channel.is_busy());
    }

    #[test]
    fn spin_limit_reports_stall() {
        let (uart, _intc, channel) = channel();
        let mut channel = channel.with_config(TransportConfig {
            spin_limit: Some(3),
        });
        uart.set_busy_polls(100);

        let err = channel.send_bytes(b"AT").unwrap_err();
        assert!(matches!(err, TransportError::Stalled { spins: 3 }));
        assert!(uart.transmitted().is_empty());
    }

    #[test]
    fn short_write_is_an_error() {
        let (uart, _intc, mut channel) = channel();
        uart.set_accept_limit(Some(2));
        let err = channel.send_bytes(b"AT+RST").unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortWrite {
                sent: 2,
                expected: 6
            }
        ));
    }

    #[test]
    fn hardware_error_propagates() {
        let (uart, _intc, mut channel) = channel();
        uart.fail_sends(io::ErrorKind::BrokenPipe);
        let err = channel.send_bytes(b"AT").unwrap_err();
        assert!(matches!(err, TransportError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn receive_interrupt_drains_fifo_into_sink() {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::with_irq(intc.line(IRQ)));
        let (sink, responses) = response_channel();
        let _channel = SerialChannel::initialize(Arc::clone(&uart), 0, &mut intc, IRQ, sink)
            .expect("init should succeed");

        uart.inject(b"ready\r\n");
        uart.inject(b"OK\r\n");

        let chunks: Vec<_> = responses.try_iter().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref(), b"ready\r\n");
        assert_eq!(chunks[1].as_ref(), b"OK\r\n");
        assert!(uart.is_receive_empty());
    }

    #[test]
    fn large_burst_is_split_at_burst_limit() {
        let uart = Arc::new(SimUart::new());
        uart.inject(&vec![b'a'; RX_BURST_MAX + 10]);

        let mut sizes = Vec::new();
        let port = ReceivePort::new(Arc::clone(&uart));
        let drained = port.drain(&mut |chunk: &[u8]| sizes.push(chunk.len()));

        assert_eq!(drained, RX_BURST_MAX + 10);
        assert_eq!(sizes, vec![RX_BURST_MAX, 10]);
    }

    #[test]
    fn send_complete_is_ignored() {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::new());
        let (sink, responses) = response_channel();
        let _channel = SerialChannel::initialize(Arc::clone(&uart), 0, &mut intc, IRQ, sink)
            .expect("init should succeed");

        assert!(intc.line(IRQ).raise(UartEvent::SendComplete));
        assert!(responses.try_iter().next().is_none());
    }

    struct FailingController {
        fail: InitStep,
    }

    impl InterruptController for FailingController {
        fn initialize(&mut self) -> io::Result<()> {
            self.check(InitStep::InitController)
        }

        fn connect(&mut self, _irq: u32, _handler: crate::InterruptHandler) -> io::Result<()> {
            self.check(InitStep::ConnectHandler)
        }

        fn start(&mut self) -> io::Result<()> {
            self.check(InitStep::StartController)
        }

        fn enable(&mut self, _irq: u32) {}
    }

    impl FailingController {
        fn check(&self, step: InitStep) -> io::Result<()> {
            if self.fail == step {
                Err(io::Error::other(format!("{step} refused")))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn init_error_names_failing_step() {
        for step in [
            InitStep::InitController,
            InitStep::ConnectHandler,
            InitStep::StartController,
        ] {
            let mut intc = FailingController { fail: step };
            let uart = Arc::new(SimUart::new());
            let err = SerialChannel::initialize(uart, 0, &mut intc, IRQ, |_: &[u8]| {})
                .expect_err("init should fail");
            assert_eq!(err.step, step);
            assert!(err.to_string().contains(step.as_str()));
        }
    }

    #[test]
    fn init_error_on_uart_configuration() {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::new());
        uart.fail_configure();
        let err = SerialChannel::initialize(uart, 9, &mut intc, IRQ, |_: &[u8]| {})
            .expect_err("init should fail");
        assert_eq!(err.step, InitStep::ConfigureUart);
        assert!(!intc.is_started());
    }

    #[test]
    fn config_serde_defaults() {
        let cfg: TransportConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, TransportConfig::default());
        let cfg: TransportConfig = serde_json::from_str(r#"{"spin_limit":10}"#).unwrap();
        assert_eq!(cfg.spin_limit, Some(10));
    }
}

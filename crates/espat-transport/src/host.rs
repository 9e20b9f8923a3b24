use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::irq::IrqLine;
use crate::traits::{UartEvent, UartHardware};

const READ_CHUNK_SIZE: usize = 256;

/// Line speed ESP-AT firmware ships with.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Read timeout on the port, so the reader thread never parks forever.
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

type BoxedReader = Box<dyn Read + Send>;
type BoxedWriter = Box<dyn Write + Send>;

/// UART backed by a host byte stream.
///
/// Used when the co-processor sits behind a tty, a pty, or any other
/// `Read`/`Write` pair. A reader thread stands in for the receive interrupt:
/// it fills the FIFO and raises the IRQ line.
pub struct HostUart {
    label: String,
    writer: Mutex<BoxedWriter>,
    reader: Mutex<Option<BoxedReader>>,
    rx: Arc<Mutex<VecDeque<u8>>>,
    irq: IrqLine,
}

impl HostUart {
    /// Open a serial port at `baud`, 8N1, no flow control.
    ///
    /// The port is cloned so the reader thread and the send path each own a
    /// handle.
    pub fn open(path: impl AsRef<Path>, baud: u32, irq: IrqLine) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |err: serialport::Error| TransportError::Open {
            path: PathBuf::from(path),
            source: io::Error::from(err),
        };

        let writer = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(open_err)?;
        let reader = writer.try_clone().map_err(open_err)?;

        debug!(?path, baud, "opened serial port");
        Ok(Self::from_io(
            path.display().to_string(),
            reader,
            writer,
            irq,
        ))
    }

    /// Wrap an arbitrary reader/writer pair.
    pub fn from_io<R, W>(label: impl Into<String>, reader: R, writer: W, irq: IrqLine) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            label: label.into(),
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(Some(Box::new(reader))),
            rx: Arc::new(Mutex::new(VecDeque::new())),
            irq,
        }
    }

    /// Device label for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn rx(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UartHardware for HostUart {
    fn configure(&self, device_id: u32) -> io::Result<()> {
        debug!(device = %self.label, device_id, "host uart configured");
        self.rx().clear();
        Ok(())
    }

    fn is_sending(&self) -> bool {
        // Writes block until the OS takes the bytes.
        false
    }

    fn send(&self, chunk: &[u8]) -> io::Result<usize> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut offset = 0usize;
        while offset < chunk.len() {
            match writer.write(&chunk[offset..]) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) => return Err(err),
            }
        }
        loop {
            match writer.flush() {
                Ok(()) => return Ok(offset),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn is_receive_empty(&self) -> bool {
        self.rx().is_empty()
    }

    fn recv_byte(&self) -> u8 {
        self.rx().pop_front().unwrap_or(0)
    }

    fn enable_interrupt(&self) -> io::Result<()> {
        let Some(mut reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            // Already armed.
            return Ok(());
        };

        let rx = Arc::clone(&self.rx);
        let irq = self.irq.clone();
        let label = self.label.clone();
        std::thread::Builder::new()
            .name("espat-uart-rx".to_string())
            .spawn(move || {
                let mut chunk = [0u8; READ_CHUNK_SIZE];
                loop {
                    let read = match reader.read(&mut chunk) {
                        Ok(0) => {
                            debug!(device = %label, "serial device closed");
                            break;
                        }
                        Ok(n) => n,
                        Err(err)
                            if matches!(
                                err.kind(),
                                ErrorKind::Interrupted | ErrorKind::TimedOut
                            ) =>
                        {
                            continue
                        }
                        Err(err) => {
                            warn!(device = %label, error = %err, "serial read failed");
                            break;
                        }
                    };
                    rx.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(chunk[..read].iter().copied());
                    irq.raise(UartEvent::ReceiveData);
                }
            })?;

        info!(device = %self.label, "receive interrupt armed");
        Ok(())
    }
}

impl std::fmt::Debug for HostUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostUart")
            .field("label", &self.label)
            .field("irq", &self.irq)
            .finish()
    }
}

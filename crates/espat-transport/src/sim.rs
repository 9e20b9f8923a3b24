//! Simulated UART for tests and dry runs.
//!
//! Records every byte and every hardware send call, can pretend to be busy,
//! can fail, and lets a test feed the receive FIFO. An optional [`Responder`]
//! plays the co-processor: it sees each transmitted line, or raw bytes while
//! it expects a payload, and its reply is queued as inbound bytes.

use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::irq::IrqLine;
use crate::traits::{UartEvent, UartHardware, TX_CHUNK_MAX};

/// Co-processor stand-in attached to a [`SimUart`].
///
/// Transmitted bytes are split into CRLF lines for [`Responder::on_line`]
/// unless [`Responder::raw_pending`] is non-zero, in which case that many
/// bytes go to [`Responder::on_raw`] as they arrive. Returned bytes are
/// queued in the receive FIFO.
pub trait Responder: Send {
    /// Reply to one transmitted line (terminator stripped).
    fn on_line(&mut self, line: &[u8]) -> Vec<u8>;

    /// Bytes to hand over unsplit before line handling resumes.
    fn raw_pending(&self) -> usize {
        0
    }

    /// Take at most `raw_pending()` bytes.
    fn on_raw(&mut self, bytes: &[u8]) -> Vec<u8> {
        let _ = bytes;
        Vec::new()
    }
}

impl<F> Responder for F
where
    F: FnMut(&[u8]) -> Vec<u8> + Send,
{
    fn on_line(&mut self, line: &[u8]) -> Vec<u8> {
        self(line)
    }
}

struct Attached {
    responder: Box<dyn Responder>,
    line: Vec<u8>,
}

impl Attached {
    fn feed(&mut self, mut chunk: &[u8]) -> Vec<u8> {
        let mut replies = Vec::new();
        while !chunk.is_empty() {
            let raw = self.responder.raw_pending();
            if raw > 0 {
                let (head, tail) = chunk.split_at(raw.min(chunk.len()));
                replies.extend(self.responder.on_raw(head));
                chunk = tail;
                continue;
            }

            self.line.push(chunk[0]);
            chunk = &chunk[1..];
            if self.line.ends_with(b"\r\n") {
                let mut line = std::mem::take(&mut self.line);
                line.truncate(line.len() - 2);
                replies.extend(self.responder.on_line(&line));
            }
        }
        replies
    }
}

#[derive(Default)]
struct SimState {
    tx: Vec<u8>,
    calls: Vec<usize>,
    rx: VecDeque<u8>,
    busy_remaining: u64,
    busy_observed: u64,
    accept_limit: Option<usize>,
    fail_send: Option<io::ErrorKind>,
    fail_configure: bool,
    configured: Option<u32>,
    interrupt_enabled: bool,
}

/// In-memory UART.
#[derive(Default)]
pub struct SimUart {
    state: Mutex<SimState>,
    responder: Mutex<Option<Attached>>,
    irq: Option<IrqLine>,
}

impl SimUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// A simulated UART that raises `irq` whenever bytes are injected.
    pub fn with_irq(irq: IrqLine) -> Self {
        Self {
            irq: Some(irq),
            ..Self::default()
        }
    }

    /// Install a co-processor stand-in.
    pub fn set_responder(&self, responder: impl Responder + 'static) {
        *self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Attached {
            responder: Box::new(responder),
            line: Vec::new(),
        });
    }

    /// Push bytes into the receive FIFO and raise the receive interrupt once
    /// the UART interrupt is armed.
    pub fn inject(&self, bytes: &[u8]) {
        let armed = {
            let mut state = self.lock();
            state.rx.extend(bytes.iter().copied());
            state.interrupt_enabled
        };
        if armed {
            if let Some(irq) = &self.irq {
                irq.raise(UartEvent::ReceiveData);
            }
        }
    }

    /// Everything transmitted so far.
    pub fn transmitted(&self) -> Vec<u8> {
        self.lock().tx.clone()
    }

    /// Transmitted bytes as lossy text.
    pub fn transmitted_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().tx).into_owned()
    }

    /// Number of bytes transmitted so far.
    pub fn transmitted_len(&self) -> usize {
        self.lock().tx.len()
    }

    /// Take and clear the transmit log.
    pub fn take_transmitted(&self) -> Vec<u8> {
        let mut state = self.lock();
        state.calls.clear();
        std::mem::take(&mut state.tx)
    }

    /// Requested length of every hardware send call, in order.
    pub fn send_calls(&self) -> Vec<usize> {
        self.lock().calls.clone()
    }

    /// Report busy for the next `polls` calls to `is_sending`.
    pub fn set_busy_polls(&self, polls: u64) {
        self.lock().busy_remaining = polls;
    }

    /// How many times `is_sending` returned `true`.
    pub fn busy_polls_observed(&self) -> u64 {
        self.lock().busy_observed
    }

    /// Accept at most `limit` bytes per send call.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        self.lock().accept_limit = limit;
    }

    /// Make every subsequent send fail with `kind`.
    pub fn fail_sends(&self, kind: io::ErrorKind) {
        self.lock().fail_send = Some(kind);
    }

    /// Make `configure` fail.
    pub fn fail_configure(&self) {
        self.lock().fail_configure = true;
    }

    /// Device id passed to `configure`, if it succeeded.
    pub fn configured_device(&self) -> Option<u32> {
        self.lock().configured
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.lock().interrupt_enabled
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UartHardware for SimUart {
    fn configure(&self, device_id: u32) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_configure {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no uart with device id {device_id}"),
            ));
        }
        state.configured = Some(device_id);
        Ok(())
    }

    fn is_sending(&self) -> bool {
        let mut state = self.lock();
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            state.busy_observed += 1;
            true
        } else {
            false
        }
    }

    fn send(&self, chunk: &[u8]) -> io::Result<usize> {
        let accepted = {
            let mut state = self.lock();
            if let Some(kind) = state.fail_send {
                return Err(io::Error::from(kind));
            }
            if chunk.len() > TX_CHUNK_MAX {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("chunk of {} bytes exceeds tx fifo", chunk.len()),
                ));
            }
            let accepted = state
                .accept_limit
                .map_or(chunk.len(), |limit| chunk.len().min(limit));
            state.calls.push(chunk.len());
            state.tx.extend_from_slice(&chunk[..accepted]);
            accepted
        };

        let replies = self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .map(|attached| attached.feed(&chunk[..accepted]))
            .unwrap_or_default();
        if !replies.is_empty() {
            self.inject(&replies);
        }
        Ok(accepted)
    }

    fn is_receive_empty(&self) -> bool {
        self.lock().rx.is_empty()
    }

    fn recv_byte(&self) -> u8 {
        self.lock().rx.pop_front().unwrap_or(0)
    }

    fn enable_interrupt(&self) -> io::Result<()> {
        self.lock().interrupt_enabled = true;
        Ok(())
    }
}

//! Receive-side subscribers.
//!
//! The UART interrupt handler hands every burst of inbound bytes to a
//! [`ResponseSink`]. A burst is whatever the FIFO held at that moment and may
//! end in the middle of a protocol line.

use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

/// Receives raw inbound bytes from interrupt context.
///
/// Implementations must return quickly and must never block or send on the
/// UART.
pub trait ResponseSink: Send {
    fn on_receive(&mut self, chunk: &[u8]);
}

impl<F> ResponseSink for F
where
    F: FnMut(&[u8]) + Send,
{
    fn on_receive(&mut self, chunk: &[u8]) {
        self(chunk)
    }
}

/// Logs each burst at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResponseSink for TracingSink {
    fn on_receive(&mut self, chunk: &[u8]) {
        debug!(
            len = chunk.len(),
            text = %String::from_utf8_lossy(chunk).escape_debug(),
            "received"
        );
    }
}

/// Fan out: both sinks see every burst, first then second.
impl<A, B> ResponseSink for (A, B)
where
    A: ResponseSink,
    B: ResponseSink,
{
    fn on_receive(&mut self, chunk: &[u8]) {
        self.0.on_receive(chunk);
        self.1.on_receive(chunk);
    }
}

/// Forwards bursts into an unbounded channel read by [`Responses`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ResponseSink for ChannelSink {
    fn on_receive(&mut self, chunk: &[u8]) {
        // A dropped receiver means nobody is listening anymore.
        let _ = self.tx.send(Bytes::copy_from_slice(chunk));
    }
}

/// Sequence of inbound byte chunks, in arrival order.
///
/// Not restartable: each chunk is yielded once. Iteration blocks until the
/// next chunk arrives and ends only when every [`ChannelSink`] is dropped.
#[derive(Debug)]
pub struct Responses {
    rx: mpsc::Receiver<Bytes>,
}

impl Responses {
    /// Wait up to `timeout` for the next chunk.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Bytes> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Chunks already queued, without waiting.
    pub fn try_iter(&self) -> impl Iterator<Item = Bytes> + '_ {
        self.rx.try_iter()
    }

    /// Concatenate everything already queued.
    pub fn drain_now(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.rx.try_iter() {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

impl Iterator for Responses {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.rx.recv().ok()
    }
}

/// Create a connected sink / subscriber pair.
pub fn response_channel() -> (ChannelSink, Responses) {
    let (tx, rx) = mpsc::channel();
    (ChannelSink { tx }, Responses { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_preserves_chunk_boundaries() {
        let (mut sink, responses) = response_channel();
        sink.on_receive(b"OK\r");
        sink.on_receive(b"\n");

        let chunks: Vec<Bytes> = responses.try_iter().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref(), b"OK\r");
        assert_eq!(chunks[1].as_ref(), b"\n");
    }

    #[test]
    fn iteration_ends_when_sink_dropped() {
        let (mut sink, responses) = response_channel();
        sink.on_receive(b"ready");
        drop(sink);

        let all: Vec<Bytes> = responses.collect();
        assert_eq!(all, vec![Bytes::from_static(b"ready")]);
    }

    #[test]
    fn closure_sink_receives_bytes() {
        let mut seen = Vec::new();
        {
            let mut sink = |chunk: &[u8]| seen.extend_from_slice(chunk);
            sink.on_receive(b"abc");
        }
        assert_eq!(seen, b"abc");
    }

    #[test]
    fn pair_feeds_both_sinks() {
        let (channel, responses) = response_channel();
        let mut sink = (channel, TracingSink);
        sink.on_receive(b"OK\r\n");
        sink.on_receive(&[0xff, b'\n']);
        assert_eq!(responses.drain_now(), [b'O', b'K', b'\r', b'\n', 0xff, b'\n']);
    }

    #[test]
    fn sink_survives_dropped_receiver() {
        let (mut sink, responses) = response_channel();
        drop(responses);
        sink.on_receive(b"ignored");
    }

    #[test]
    fn recv_timeout_and_drain() {
        let (mut sink, responses) = response_channel();
        assert!(responses.recv_timeout(Duration::from_millis(1)).is_none());
        sink.on_receive(b"AT");
        sink.on_receive(b"+GMR");
        assert_eq!(responses.drain_now(), b"AT+GMR");
    }
}

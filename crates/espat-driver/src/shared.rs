use std::sync::{Arc, Mutex, TryLockError};

use tracing::debug;

use crate::driver::AtDriver;
use crate::error::{DriverError, Result};

/// A driver shared between threads.
///
/// Only one operation runs at a time. A caller that finds the driver in use
/// gets [`DriverError::Busy`] instead of waiting, so commands from different
/// threads never interleave on the wire.
pub struct SharedDriver<H, D> {
    inner: Arc<Mutex<AtDriver<H, D>>>,
}

impl<H, D> SharedDriver<H, D> {
    pub fn new(driver: AtDriver<H, D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Run `op` with exclusive access, or fail with [`DriverError::Busy`].
    pub fn try_run<T>(&self, op: impl FnOnce(&mut AtDriver<H, D>) -> Result<T>) -> Result<T> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            // Poisoned means a command panicked mid-line; treat it as failed.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("driver busy");
                return Err(DriverError::Busy);
            }
        };
        op(&mut guard)
    }
}

impl<H, D> Clone for SharedDriver<H, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use espat_transport::{SerialChannel, SimUart, SoftInterruptController};

    use super::*;
    use crate::config::DriverConfig;
    use crate::delay::ThreadDelay;

    fn shared() -> (Arc<SimUart>, SharedDriver<SimUart, ThreadDelay>) {
        let mut intc = SoftInterruptController::new();
        let uart = Arc::new(SimUart::new());
        let channel = SerialChannel::initialize(Arc::clone(&uart), 0, &mut intc, 1, |_: &[u8]| {})
            .expect("init should succeed");
        let driver = AtDriver::with_config(channel, ThreadDelay, DriverConfig::immediate());
        (uart, SharedDriver::new(driver))
    }

    #[test]
    fn runs_when_free() {
        let (uart, shared) = shared();
        shared.try_run(|d| d.check_version()).unwrap();
        assert_eq!(uart.transmitted(), b"AT+GMR\r\n");
    }

    #[test]
    fn concurrent_caller_gets_busy() {
        let (uart, shared) = shared();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = shared.clone();
        let handle = thread::spawn(move || {
            holder.try_run(|d| {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                d.connection_status()
            })
        });

        entered_rx.recv().unwrap();
        let err = shared.try_run(|d| d.check_version()).unwrap_err();
        assert!(matches!(err, DriverError::Busy));

        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(uart.transmitted(), b"AT+CIPSTATUS\r\n");
    }

    #[test]
    fn operation_error_is_returned() {
        let (uart, shared) = shared();
        let err = shared.try_run(|d| d.send_payload(b"")).unwrap_err();
        assert!(matches!(err, DriverError::Validation(_)));
        assert!(uart.transmitted().is_empty());
    }
}

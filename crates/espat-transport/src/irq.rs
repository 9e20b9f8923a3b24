//! In-process interrupt controller.
//!
//! Stands in for a platform interrupt controller on hosts and in tests. A
//! UART implementation holds an [`IrqLine`] and raises it when bytes arrive;
//! the connected handler runs on the raising thread.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::traits::{InterruptController, InterruptHandler, UartEvent};

#[derive(Default)]
struct ControllerState {
    initialized: bool,
    started: bool,
    enabled: HashSet<u32>,
    handlers: HashMap<u32, InterruptHandler>,
}

/// Software interrupt controller.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone, Default)]
pub struct SoftInterruptController {
    state: Arc<Mutex<ControllerState>>,
}

impl SoftInterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used by a peripheral to raise `irq`.
    pub fn line(&self, irq: u32) -> IrqLine {
        IrqLine {
            irq,
            state: Arc::clone(&self.state),
        }
    }

    /// Whether [`start`](InterruptController::start) has been called.
    pub fn is_started(&self) -> bool {
        lock(&self.state).started
    }

    /// Whether `irq` is unmasked.
    pub fn is_enabled(&self, irq: u32) -> bool {
        lock(&self.state).enabled.contains(&irq)
    }
}

impl InterruptController for SoftInterruptController {
    fn initialize(&mut self) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.initialized = true;
        state.started = false;
        state.enabled.clear();
        state.handlers.clear();
        Ok(())
    }

    fn connect(&mut self, irq: u32, handler: InterruptHandler) -> io::Result<()> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "interrupt controller not initialized",
            ));
        }
        state.handlers.insert(irq, handler);
        Ok(())
    }

    fn start(&mut self) -> io::Result<()> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "interrupt controller not initialized",
            ));
        }
        state.started = true;
        Ok(())
    }

    fn enable(&mut self, irq: u32) {
        lock(&self.state).enabled.insert(irq);
    }
}

/// One interrupt input of a [`SoftInterruptController`].
#[derive(Clone)]
pub struct IrqLine {
    irq: u32,
    state: Arc<Mutex<ControllerState>>,
}

impl IrqLine {
    /// Deliver `event` to the connected handler.
    ///
    /// Returns `false` when the controller is stopped, the line is masked, or
    /// nothing is connected. Handlers run one at a time.
    pub fn raise(&self, event: UartEvent) -> bool {
        let mut state = lock(&self.state);
        if !state.started || !state.enabled.contains(&self.irq) {
            trace!(irq = self.irq, ?event, "interrupt masked");
            return false;
        }
        match state.handlers.get_mut(&self.irq) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrqLine").field("irq", &self.irq).finish()
    }
}

fn lock(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_handler(count: Arc<AtomicUsize>) -> InterruptHandler {
        Box::new(move |_event| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn raise_requires_start_and_enable() {
        let mut intc = SoftInterruptController::new();
        let line = intc.line(3);
        let count = Arc::new(AtomicUsize::new(0));

        intc.initialize().unwrap();
        intc.connect(3, counting_handler(count.clone())).unwrap();
        assert!(!line.raise(UartEvent::ReceiveData));

        intc.start().unwrap();
        assert!(!line.raise(UartEvent::ReceiveData), "line still masked");

        intc.enable(3);
        assert!(line.raise(UartEvent::ReceiveData));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connect_before_initialize_fails() {
        let mut intc = SoftInterruptController::new();
        let err = intc
            .connect(1, Box::new(|_| {}))
            .expect_err("connect should fail before initialize");
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(intc.start().is_err());
    }

    #[test]
    fn lines_are_independent() {
        let mut intc = SoftInterruptController::new();
        let count = Arc::new(AtomicUsize::new(0));
        intc.initialize().unwrap();
        intc.connect(1, counting_handler(count.clone())).unwrap();
        intc.start().unwrap();
        intc.enable(1);
        intc.enable(2);

        assert!(!intc.line(2).raise(UartEvent::ReceiveData));
        assert!(intc.line(1).raise(UartEvent::SendComplete));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(intc.is_started());
        assert!(intc.is_enabled(2));
    }
}

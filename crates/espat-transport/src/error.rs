use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while moving bytes over the UART link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The hardware rejected a send call.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The hardware accepted fewer bytes than it was handed.
    #[error("short write ({sent} of {expected} bytes accepted)")]
    ShortWrite { sent: usize, expected: usize },

    /// The transmitter stayed busy past the configured spin limit.
    #[error("transmitter still busy after {spins} polls")]
    Stalled { spins: u64 },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Hardware bring-up step that failed during [`SerialChannel::initialize`].
///
/// [`SerialChannel::initialize`]: crate::SerialChannel::initialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    ConfigureUart,
    InitController,
    ConnectHandler,
    StartController,
    ArmInterrupt,
}

impl InitStep {
    pub fn as_str(self) -> &'static str {
        match self {
            InitStep::ConfigureUart => "configure uart",
            InitStep::InitController => "initialize interrupt controller",
            InitStep::ConnectHandler => "connect uart interrupt handler",
            InitStep::StartController => "start interrupt controller",
            InitStep::ArmInterrupt => "arm uart interrupt",
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware registration failed. Fatal: the link is unusable.
#[derive(Debug, thiserror::Error)]
#[error("could not {step}: {source}")]
pub struct InitError {
    pub step: InitStep,
    #[source]
    pub source: std::io::Error,
}

impl InitError {
    pub fn new(step: InitStep, source: std::io::Error) -> Self {
        Self { step, source }
    }
}

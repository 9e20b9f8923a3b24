/// Errors that can occur in driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A parameter was rejected before anything was sent.
    #[error("invalid command: {0}")]
    Validation(#[from] espat_command::ValidationError),

    /// The link failed mid-command. The co-processor state is unknown.
    #[error("transport error: {0}")]
    Transport(#[from] espat_transport::TransportError),

    /// Another caller holds the driver.
    #[error("driver busy: another operation is in flight")]
    Busy,
}

pub type Result<T> = std::result::Result<T, DriverError>;

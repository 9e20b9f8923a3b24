/// A caller-supplied parameter is outside what the AT protocol accepts.
///
/// Raised before anything is written to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Numeric parameter outside its range.
    #[error("{param} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        param: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Enumerated value the protocol defines but the co-processor rejects.
    #[error("{param} value {value} is not supported")]
    Unsupported { param: &'static str, value: i64 },

    /// Named choice the protocol does not define.
    #[error("{param} {value:?} is not recognized")]
    UnknownName { param: &'static str, value: String },

    /// String parameter length outside its range (bytes).
    #[error("{param} length must be in [{min}, {max}], got {len}")]
    Length {
        param: &'static str,
        len: usize,
        min: usize,
        max: usize,
    },

    /// String parameter contains a byte that would break line framing.
    #[error("{param} contains forbidden character {ch:?}")]
    InvalidChar { param: &'static str, ch: char },

    /// Positional parameter given without the one before it.
    #[error("{param} requires {requires}")]
    MissingDependency {
        param: &'static str,
        requires: &'static str,
    },

    /// BSSID is not six colon-separated hex octets.
    #[error("invalid bssid {0:?} (expected xx:xx:xx:xx:xx:xx)")]
    InvalidBssid(String),
}

/// A byte sequence is not a command this crate can encode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Line does not start with `AT+`.
    #[error("missing AT+ prefix")]
    MissingPrefix,

    /// Line is not valid ASCII/UTF-8.
    #[error("command is not valid text")]
    NotText,

    /// Prefix/form combination is not in the command table.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// Parameter list cannot be split (unterminated quote, stray bytes).
    #[error("malformed parameter list in {0:?}")]
    Syntax(String),

    /// Parameter count outside the command's arity.
    #[error("{command} takes {min}..={max} parameters, got {got}")]
    Arity {
        command: &'static str,
        got: usize,
        min: usize,
        max: usize,
    },

    /// Parameter could not be parsed.
    #[error("{command} parameter {index} is malformed")]
    Malformed { command: &'static str, index: usize },

    /// Decoded parameters fail validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

use thiserror::Error;

/// Error that can happen while reading or writing a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SerdesError {
    /// The data is not in the expected format (bad magic string)
    #[error("Invalid format")]
    InvalidFormat,
    /// A string doesn't fit into its fixed-length field.
    ///
    /// Strings are never silently truncated when written.
    #[error("`{name}` is {len} bytes long, but the field only holds {max}")]
    LengthExceeded {
        /// Name of the field
        name: &'static str,
        /// Encoded length of the string
        len: usize,
        /// Size of the field
        max: usize,
    },
    /// The data or the stream is not consistent with what the schema expects.
    ///
    /// Only returned as an error by strict sessions, otherwise it is just reported.
    #[error("Assertion failed for `{name}`: expected {expected:#x}, got {actual:#x}")]
    AssertionViolation {
        /// What was being checked
        name: &'static str,
        /// The expected value
        expected: u64,
        /// The value actually found
        actual: u64,
    },
    /// A string contains characters the Windows-1252 code page can't represent
    #[error("`{name}` contains characters outside of Windows-1252")]
    Unencodable {
        /// Name of the field
        name: &'static str,
    },
    /// The caller asked for something the format can't express
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Premature end of the input
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// Any other I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for SerdesError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            kind => Self::Io(kind),
        }
    }
}

/// Result of a serdes operation
pub type SerdesResult<T = ()> = Result<T, SerdesError>;

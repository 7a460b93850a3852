use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// 固定长度的块读不满
    #[error("truncated {what}: expected {expected} bytes, got {actual}")]
    TruncatedRead {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("header length mismatch: declared {declared} bytes, decoded {actual}")]
    HeaderInconsistency { declared: u64, actual: u64 },

    #[error("unknown sample representation: {0}")]
    UnsupportedRepresentation(String),

    #[error("event flag count mismatch: expected {expected}, got {actual}")]
    RecordShapeMismatch { expected: usize, actual: usize },

    #[error("degenerate scale range: min {min} equals max {max}")]
    DegenerateScale { min: f64, max: f64 },

    #[error("Invalid header field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),
}

impl DecodeError {
    pub(crate) fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;

use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Invalid hash length: expected 32, got {0}")]
    InvalidHashLength(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Content hash mismatch: stored {stored}, computed {computed}")]
    ContentHashMismatch { stored: String, computed: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} too long: max {max}, got {actual}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Invalid amount: must be greater than zero")]
    ZeroAmount,

    #[error("Invalid time window: ends at {ends_at} before start {starts_at}")]
    InvalidTimeWindow { starts_at: u64, ends_at: u64 },
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}

impl From<borsh::io::Error> for TypesError {
    fn from(e: borsh::io::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}

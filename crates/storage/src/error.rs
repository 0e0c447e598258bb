//! Hash engine error types

use crate::key_encoding::DecodeError;
use crate::traits::StoreError;
use thiserror::Error;

/// Hash command error
///
/// A missing field or container is not an error: lookups return `Option`
/// and enumerations return empty vectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Name already bound to a different container kind
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    InvalidInt,
    #[error("value is not a valid float")]
    InvalidFloat,
    #[error("increment would overflow")]
    Overflow,
    #[error("decrement would underflow")]
    Underflow,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("name too long: {0} bytes (max: 255 bytes)")]
    NameTooLong(usize),
    #[error("corrupt row: {0}")]
    Decode(#[from] DecodeError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl HashError {
    /// Negative status code for the tri-state result contract
    pub fn code(&self) -> i32 {
        match self {
            HashError::Store(_) => -1,
            HashError::WrongType => -2,
            HashError::InvalidInt => -3,
            HashError::InvalidFloat => -4,
            HashError::Overflow => -5,
            HashError::Underflow => -6,
            HashError::Syntax(_) => -7,
            HashError::Decode(_) => -8,
            HashError::NameTooLong(_) => -9,
        }
    }
}

pub type HashResult<T> = Result<T, HashError>;

//! Error types for PolyVault

use crate::entry::Kind;
use std::io;
use thiserror::Error;

/// Result type alias for PolyVault operations
pub type Result<T> = std::result::Result<T, PolyVaultError>;

/// Custom error types for PolyVault
#[derive(Error, Debug)]
pub enum PolyVaultError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol parse error: {0}")]
    Protocol(String),

    /// The key is unbound and no variant registers the requested operation.
    #[error("Error: that key does not exist")]
    NoSuchKey,

    #[error("wrong number of arguments for '{op}' (given {given}, expected {expected})")]
    WrongArity {
        op: String,
        given: usize,
        expected: usize,
    },

    #[error("undefined operation '{op}' for {kind} entry")]
    UnsupportedOperation { op: String, kind: Kind },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl PolyVaultError {
    /// True for failures raised by an operation against an entry, as opposed to
    /// routing, parsing or transport failures.
    pub fn is_operation_failure(&self) -> bool {
        matches!(
            self,
            PolyVaultError::WrongArity { .. }
                | PolyVaultError::UnsupportedOperation { .. }
                | PolyVaultError::InvalidArgument(_)
        )
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for PolyVaultError {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        PolyVaultError::Protocol(format!("Parse error: {:?}", err))
    }
}

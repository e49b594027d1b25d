//! Error taxonomy shared by every remote interface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of naming, storage and RPC operations with error type [`DfsError`].
pub type DfsResult<T> = std::result::Result<T, DfsError>;

/// Errors surfaced by the public interfaces.
///
/// Every remote method can fail with [`DfsError::Remote`]; the other kinds
/// are logical failures that round-trip through the RPC substrate unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DfsError {
    /// Transport-level failure: connect, read, write, encode, decode, or an
    /// unknown method on the remote side. Never retried automatically.
    #[error("remote call failed: {0}")]
    Remote(String),
    /// The path does not exist, or no storage server can satisfy the
    /// request.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed path, out-of-range offset, or an operation on the root
    /// where the root is disallowed.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),
    /// `register` was called with a storage server already in the registry.
    #[error("storage server already registered")]
    AlreadyRegistered,
    /// `start` or `stop` was called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    State(String),
}

impl DfsError {
    pub fn remote(message: impl ToString) -> Self {
        Self::Remote(message.to_string())
    }

    pub fn not_found(message: impl ToString) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn invalid(message: impl ToString) -> Self {
        Self::ArgumentInvalid(message.to_string())
    }

    pub fn state(message: impl ToString) -> Self {
        Self::State(message.to_string())
    }
}

impl From<std::io::Error> for DfsError {
    fn from(error: std::io::Error) -> Self {
        Self::Remote(error.to_string())
    }
}

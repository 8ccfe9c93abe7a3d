use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared across the naming server, storage servers, the RPC
/// transport, and the CLI.
#[derive(Debug, Error)]
pub enum DfsError {
    /// A required path or endpoint argument was absent.
    #[error("required argument was null")]
    NullArg,

    /// Path string did not parse.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The target path (or a required ancestor) is not present in the
    /// index or on disk.
    #[error("not found: {0}")]
    NotFound(String),

    /// No storage server is registered when one is required.
    #[error("no storage servers registered")]
    NoStorages,

    /// The endpoint pair is already known to the naming server.
    #[error("endpoint already registered: {0}")]
    AlreadyRegistered(String),

    /// `unlock` of a request not currently held.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Read/write offset or length invalid.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    /// Underlying RPC failed (network, timeout, decode).
    #[error("transport error: {0}")]
    Transport(String),

    /// Local filesystem error at a storage server.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DfsResult<T> = std::result::Result<T, DfsError>;

/// Serializable mirror of [`DfsError`] used to carry error kinds across
/// the RPC transport, which speaks JSON and has no way to serialize
/// `std::io::Error` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireError {
    NullArg,
    InvalidPath(String),
    NotFound(String),
    NoStorages,
    AlreadyRegistered(String),
    IllegalArgument(String),
    IndexOutOfBounds(String),
    Transport(String),
    Io(String),
}

impl From<&DfsError> for WireError {
    fn from(err: &DfsError) -> Self {
        match err {
            DfsError::NullArg => WireError::NullArg,
            DfsError::InvalidPath(s) => WireError::InvalidPath(s.clone()),
            DfsError::NotFound(s) => WireError::NotFound(s.clone()),
            DfsError::NoStorages => WireError::NoStorages,
            DfsError::AlreadyRegistered(s) => WireError::AlreadyRegistered(s.clone()),
            DfsError::IllegalArgument(s) => WireError::IllegalArgument(s.clone()),
            DfsError::IndexOutOfBounds(s) => WireError::IndexOutOfBounds(s.clone()),
            DfsError::Transport(s) => WireError::Transport(s.clone()),
            DfsError::Io(e) => WireError::Io(e.to_string()),
        }
    }
}

impl From<DfsError> for WireError {
    fn from(err: DfsError) -> Self {
        (&err).into()
    }
}

impl From<WireError> for DfsError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::NullArg => DfsError::NullArg,
            WireError::InvalidPath(s) => DfsError::InvalidPath(s),
            WireError::NotFound(s) => DfsError::NotFound(s),
            WireError::NoStorages => DfsError::NoStorages,
            WireError::AlreadyRegistered(s) => DfsError::AlreadyRegistered(s),
            WireError::IllegalArgument(s) => DfsError::IllegalArgument(s),
            WireError::IndexOutOfBounds(s) => DfsError::IndexOutOfBounds(s),
            WireError::Transport(s) => DfsError::Transport(s),
            WireError::Io(s) => DfsError::Io(std::io::Error::other(s)),
        }
    }
}

/// A `Result` with the wire-safe error type, as sent over RPC responses.
pub type WireResult<T> = std::result::Result<T, WireError>;

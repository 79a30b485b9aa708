//! Error types for pinstore_core.

use crate::context::CancelReason;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using pinstore_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during block store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The input stream could not be fully consumed.
    #[error("Failed to read input: {source}")]
    Read { source: std::io::Error },

    /// The underlying block write or delete failed.
    #[error("Block store failure for {cid}: {reason}")]
    Store { cid: String, reason: String },

    /// A path did not resolve to a content identifier.
    #[error("Failed to resolve {path}: {reason}")]
    Resolution { path: String, reason: String },

    /// The resolved identifier is absent from the store.
    #[error("Block not found: {cid}")]
    NotFound { cid: String },

    /// Refusal to remove a pinned block without force.
    #[error("Block {cid} is pinned")]
    Pinned { cid: String },

    /// A pin add, remove or flush failed.
    ///
    /// When returned from a put, the block itself was stored.
    #[error("Pin operation failed for {cid}: {reason}")]
    PinOperation { cid: String, reason: String },

    /// The identifier is not pinned in the requested mode.
    #[error("Not pinned: {cid}")]
    NotPinned { cid: String },

    /// The caller's context ended before completion.
    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    /// Invalid content identifier.
    #[error("Invalid CID: {reason}")]
    InvalidCid { reason: String },

    /// Invalid CID prefix (version/codec/algorithm combination).
    #[error("Invalid CID prefix: {reason}")]
    InvalidPrefix { reason: String },

    /// Unsupported hash algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Unsupported codec.
    #[error("Unsupported codec: {codec}")]
    UnsupportedCodec { codec: String },

    /// Malformed content path.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Object file is corrupted or invalid.
    #[error("Corrupted object at {path}: {reason}")]
    CorruptedObject { path: PathBuf, reason: String },

    /// Invalid name.
    #[error("Invalid name: {reason}")]
    InvalidName { reason: String },

    /// Name not found.
    #[error("Name not found: {name}")]
    NameNotFound { name: String },
}

impl Error {
    /// Create a Read error.
    pub fn read(source: std::io::Error) -> Self {
        Error::Read { source }
    }

    /// Create a Store error.
    pub fn store(cid: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Store {
            cid: cid.into(),
            reason: reason.into(),
        }
    }

    /// Create a Resolution error.
    pub fn resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Resolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(cid: impl Into<String>) -> Self {
        Error::NotFound { cid: cid.into() }
    }

    /// Create a Pinned error.
    pub fn pinned(cid: impl Into<String>) -> Self {
        Error::Pinned { cid: cid.into() }
    }

    /// Create a PinOperation error.
    pub fn pin_operation(cid: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PinOperation {
            cid: cid.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotPinned error.
    pub fn not_pinned(cid: impl Into<String>) -> Self {
        Error::NotPinned { cid: cid.into() }
    }

    /// Create a Cancelled error.
    pub fn cancelled(reason: CancelReason) -> Self {
        Error::Cancelled { reason }
    }

    /// Create an InvalidCid error.
    pub fn invalid_cid(reason: impl Into<String>) -> Self {
        Error::InvalidCid {
            reason: reason.into(),
        }
    }

    /// Create an InvalidPrefix error.
    pub fn invalid_prefix(reason: impl Into<String>) -> Self {
        Error::InvalidPrefix {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create an UnsupportedCodec error.
    pub fn unsupported_codec(codec: impl Into<String>) -> Self {
        Error::UnsupportedCodec {
            codec: codec.into(),
        }
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a CorruptedObject error.
    pub fn corrupted_object(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidName error.
    pub fn invalid_name(reason: impl Into<String>) -> Self {
        Error::InvalidName {
            reason: reason.into(),
        }
    }

    /// Create a NameNotFound error.
    pub fn name_not_found(name: impl Into<String>) -> Self {
        Error::NameNotFound { name: name.into() }
    }

    /// Returns true if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

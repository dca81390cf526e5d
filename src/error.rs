//! Error types for dataset access
//!
//! All errors that can surface from a lookup are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

/// the main error type for dataset operations
#[derive(Debug, Error)]
pub enum Error {
    /// a SHA-1 was given with the wrong length or non-hex characters
    #[error("invalid SHA1 hash: {0}")]
    InvalidSha(String),

    /// the key is absent from its shard, or a blob offset points outside
    /// the archive. Callers commonly catch this and continue iteration.
    #[error("{kind} not found: {key}")]
    ObjectNotFound { kind: &'static str, key: String },

    /// an LZF frame, tree record or commit header failed to decode
    #[error("compressed data corrupted (invalid length): {0}")]
    CorruptFrame(String),

    /// a shard file cannot be opened or scanned
    #[error("shard unavailable: {path}: {reason}")]
    ShardUnavailable { path: PathBuf, reason: String },

    /// host gating failed at initialization
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Error::ObjectNotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn shard(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ShardUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// check if this error indicates the key simply isn't in the dataset
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    /// check if this error indicates a malformed on-disk record
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptFrame(_))
    }
}

/// result type alias for dataset operations
pub type Result<T> = std::result::Result<T, Error>;

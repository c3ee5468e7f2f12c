//! src/error.rs
//! ============================================================================
//! # `FsError`: Unified Error Type for the File Manager Engine
//!
//! Every engine operation returns `FsResult<T>`. User cancellation is not an
//! error: it is reported through `Outcome::Canceled`.

use std::io;
use thiserror::Error;

use clipr::ClipError;

pub type FsResult<T> = Result<T, FsError>;

/// Coarse classification of an [`FsError`], for callers that only need to
/// pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    PermissionDenied,
    Io,
    InsufficientStorage,
    CrossDeviceMoveUnsupported,
    NothingPending,
    InvalidPath,
    Config,
}

/// Unified error type for all engine operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Requested file or directory does not exist.
    #[error("File or directory not found: {path}")]
    NotFound { path: String },

    /// Permissions error for file/directory access.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Generic read/write/open/remove failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Pre-flight quota check failed before anything was written.
    #[error("Not enough free space to copy {path}: need {required} bytes, {available} available")]
    InsufficientStorage {
        path: String,
        required: u64,
        available: u64,
    },

    /// Source and destination live on different volumes.
    #[error("Cannot move {src} to {dest}: different volumes")]
    CrossDeviceMoveUnsupported { src: String, dest: String },

    /// Paste or move requested with an empty clipboard.
    #[error("Nothing pending on the clipboard")]
    NothingPending,

    /// Path that the engine refuses to operate on.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Configuration-derived failure (unknown volume, bad backend setup).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FsError {
    /// Wrap an `io::Error`, lifting not-found and permission failures into
    /// their own variants.
    pub fn io<P: Into<String>>(path: P, source: io::Error) -> Self {
        let path: String = path.into();

        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn invalid_path<P: Into<String>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FsErrorKind {
        match self {
            Self::NotFound { .. } => FsErrorKind::NotFound,
            Self::PermissionDenied { .. } => FsErrorKind::PermissionDenied,
            Self::Io { .. } => FsErrorKind::Io,
            Self::InsufficientStorage { .. } => FsErrorKind::InsufficientStorage,
            Self::CrossDeviceMoveUnsupported { .. } => FsErrorKind::CrossDeviceMoveUnsupported,
            Self::NothingPending => FsErrorKind::NothingPending,
            Self::InvalidPath { .. } => FsErrorKind::InvalidPath,
            Self::Config(_) => FsErrorKind::Config,
        }
    }
}

impl From<ClipError> for FsError {
    fn from(e: ClipError) -> Self {
        match e {
            ClipError::NothingPending => Self::NothingPending,
            ClipError::InvalidPath(p) => Self::invalid_path(p.as_str(), "empty clipboard source"),
            ClipError::InvalidName(n) => {
                Self::invalid_path(n.as_str(), "not a valid entry name")
            }
        }
    }
}

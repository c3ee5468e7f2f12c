//! Clipboard error types

use compact_str::CompactString;
use thiserror::Error;

pub type ClipResult<T> = Result<T, ClipError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipError {
    #[error("Clipboard is empty: nothing pending")]
    NothingPending,

    #[error("Invalid source path: {0:?}")]
    InvalidPath(CompactString),

    #[error("Invalid display name: {0:?}")]
    InvalidName(CompactString),
}

impl ClipError {
    #[inline]
    pub fn invalid_path(path: &str) -> Self {
        Self::InvalidPath(CompactString::from(path))
    }

    #[inline]
    pub fn invalid_name(name: &str) -> Self {
        Self::InvalidName(CompactString::from(name))
    }
}

//! ``src/operators/progress.rs``
//!
//! Callback and result types shared by the copy/delete/move engines.

use std::sync::atomic::{AtomicBool, Ordering};

use compact_str::CompactString;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Snapshot handed to a [`ProgressSink`] after each chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub label: CompactString,
    pub offset: u64,
    pub total: u64,
}

impl Progress {
    /// `total` of zero is stored as 1 so `fraction()` never divides by zero.
    pub fn new(label: impl Into<CompactString>, offset: u64, total: u64) -> Self {
        Self {
            label: label.into(),
            offset,
            total: total.max(1),
        }
    }

    /// Completed fraction in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        (self.offset.min(self.total) as f64) / (self.total as f64)
    }

    /// Whole percent, 0..=100.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}

/// Receives progress synchronously. Must return quickly and must not touch
/// storage.
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress);
    }
}

/// Sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: &Progress) {}
}

/// Polled between chunks and once per directory entry.
pub trait CancelPoll {
    fn is_canceled(&self) -> bool;
}

impl<F: Fn() -> bool> CancelPoll for F {
    fn is_canceled(&self) -> bool {
        self()
    }
}

impl CancelPoll for AtomicBool {
    fn is_canceled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl CancelPoll for CancellationToken {
    fn is_canceled(&self) -> bool {
        self.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelPoll for NeverCancel {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Non-error terminal state of an engine operation. Failures travel as
/// `Err(FsError)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Completed,

    /// Stopped by the cancellation poll. Whatever was already written or
    /// removed stays that way.
    Canceled,
}

impl Outcome {
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Counters for the most recent engine operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub dirs_created: u64,
    pub files_removed: u64,
    pub dirs_removed: u64,
}

impl OpStats {
    /// True when a delete removed at least one entry.
    #[must_use]
    pub const fn removed_any(&self) -> bool {
        self.files_removed + self.dirs_removed > 0
    }
}

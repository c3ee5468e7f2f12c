//! ``src/operators/resource_lock.rs``
//!
//! # `ResourceLock`: keep the device awake while storage I/O is in flight
//!
//! Re-entrant. Only the outermost `acquire` and the matching final release
//! reach the [`SuspendInhibitor`]; nested acquisitions from recursive copy or
//! delete only bump a depth counter. Release lives in [`ResourceGuard`]'s
//! `Drop`, so every exit path (early `?`, cancellation, panic unwind) lets go.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

/// Platform hook that blocks suspend / power-off.
pub trait SuspendInhibitor: Send + Sync {
    fn inhibit(&self);

    fn release(&self);
}

/// Default hook for hosts with no power management: just logs.
#[derive(Debug, Default)]
pub struct LogInhibitor;

impl SuspendInhibitor for LogInhibitor {
    fn inhibit(&self) {
        debug!("Suspend inhibited");
    }

    fn release(&self) {
        debug!("Suspend allowed");
    }
}

pub struct ResourceLock {
    depth: AtomicUsize,
    inhibitor: Arc<dyn SuspendInhibitor>,
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLock")
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

impl Default for ResourceLock {
    fn default() -> Self {
        Self::new(Arc::new(LogInhibitor))
    }
}

impl ResourceLock {
    pub fn new(inhibitor: Arc<dyn SuspendInhibitor>) -> Self {
        Self {
            depth: AtomicUsize::new(0),
            inhibitor,
        }
    }

    #[must_use = "the lock is released as soon as the guard is dropped"]
    pub fn acquire(&self) -> ResourceGuard<'_> {
        let prev: usize = self.depth.fetch_add(1, Ordering::AcqRel);

        if prev == 0 {
            self.inhibitor.inhibit();
        }

        trace!(depth = prev + 1, "ResourceLock acquired");

        ResourceGuard { lock: self }
    }

    /// Current nesting depth; zero when idle.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    fn release(&self) {
        let prev: usize = self.depth.fetch_sub(1, Ordering::AcqRel);

        if prev == 1 {
            self.inhibitor.release();
        }

        trace!(depth = prev - 1, "ResourceLock released");
    }
}

pub struct ResourceGuard<'a> {
    lock: &'a ResourceLock,
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

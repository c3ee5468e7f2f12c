//! ``src/fs/dir_scanner.rs``
//!
//! # Directory Scanner
//!
//! Enumerates a directory through the storage backend. Entries come back in
//! enumeration order; sorting is the caller's job (see [`crate::fs::sort`]).

use tracing::{debug, instrument};

use crate::error::{FsError, FsResult};
use crate::fs::dir_entry::DirEntry;
use crate::storage::StorageBackend;

/// List `path`, skipping `.` and `..`. Metadata comes from the enumeration
/// itself; no per-entry stat. The handle is dropped on every return path.
#[instrument(level = "debug", skip(backend))]
pub fn list_dir(backend: &dyn StorageBackend, path: &str) -> FsResult<Vec<DirEntry>> {
    let iter = backend.read_dir(path).map_err(|e| FsError::io(path, e))?;

    let mut entries: Vec<DirEntry> = Vec::new();

    for entry in iter {
        let entry: DirEntry = entry.map_err(|e| FsError::io(path, e))?;

        if DirEntry::is_pseudo(&entry.name) {
            continue;
        }

        entries.push(entry);
    }

    debug!(count = entries.len(), "Directory listed");

    Ok(entries)
}

//! ``src/operators/delete.rs``
//!
//! Recursive delete. Children go first, then the emptied directory. The
//! first failing removal aborts the walk; [`OpStats`] tells the caller how
//! much was already gone by then.

use tracing::{debug, instrument, warn};

use crate::error::{FsError, FsResult};
use crate::fs::dir_entry::DirEntry;
use crate::fs::path::{build_path, is_volume_root};
use crate::operators::progress::{CancelPoll, OpStats, Outcome};
use crate::operators::resource_lock::{ResourceGuard, ResourceLock};
use crate::storage::StorageBackend;

pub struct DeleteEngine<'a> {
    backend: &'a dyn StorageBackend,
    lock: &'a ResourceLock,
    stats: OpStats,
    op_id: String,
}

impl<'a> DeleteEngine<'a> {
    pub fn new(backend: &'a dyn StorageBackend, lock: &'a ResourceLock) -> Self {
        Self {
            backend,
            lock,
            stats: OpStats::default(),
            op_id: nanoid::nanoid!(),
        }
    }

    pub const fn stats(&self) -> OpStats {
        self.stats
    }

    #[instrument(level = "debug", skip(self, cancel), fields(op_id = %self.op_id))]
    pub fn delete(&mut self, path: &str, is_dir: bool, cancel: &dyn CancelPoll) -> FsResult<Outcome> {
        if is_volume_root(path) {
            return Err(FsError::invalid_path(path, "cannot delete a volume root"));
        }

        if !is_dir {
            self.remove_file(path)?;

            return Ok(Outcome::Completed);
        }

        let _guard: ResourceGuard<'_> = self.lock.acquire();
        let backend: &'a dyn StorageBackend = self.backend;

        let children = match backend.read_dir(path) {
            Ok(children) => children,

            // listed as a directory but cannot be opened as one
            Err(e) => {
                warn!(error = %e, "Cannot enumerate directory, removing as a file");
                self.remove_file(path)?;

                return Ok(Outcome::Completed);
            }
        };

        for entry in children {
            if cancel.is_canceled() {
                debug!(
                    removed = self.stats.files_removed + self.stats.dirs_removed,
                    "Delete canceled"
                );

                return Ok(Outcome::Canceled);
            }

            let entry: DirEntry = entry.map_err(|e| FsError::io(path, e))?;

            if DirEntry::is_pseudo(&entry.name) {
                continue;
            }

            let child: String = build_path(path, &entry.name);

            if entry.is_dir {
                if self.delete(&child, true, cancel)? == Outcome::Canceled {
                    return Ok(Outcome::Canceled);
                }
            } else {
                self.remove_file(&child)?;
            }
        }

        backend.remove_dir(path).map_err(|e| FsError::io(path, e))?;
        self.stats.dirs_removed += 1;

        debug!("Directory removed");

        Ok(Outcome::Completed)
    }

    fn remove_file(&mut self, path: &str) -> FsResult<()> {
        self.backend
            .remove_file(path)
            .map_err(|e| FsError::io(path, e))?;
        self.stats.files_removed += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsErrorKind;
    use crate::fs::dir_scanner::list_dir;
    use crate::operators::progress::NeverCancel;
    use crate::operators::resource_lock::tests::CountingInhibitor;
    use crate::storage::{HostBackend, MemoryBackend};
    use std::cell::Cell;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn seeded() -> MemoryBackend {
        let mem = MemoryBackend::with_volume("ms0", 1 << 20);
        mem.put_file("ms0:/PSP/GAME/EBOOT.PBP", b"boot").unwrap();
        mem.put_file("ms0:/PSP/GAME/DATA/a.bin", b"a").unwrap();
        mem.put_file("ms0:/PSP/GAME/DATA/b.bin", b"b").unwrap();
        mem.put_file("ms0:/PSP/keep.txt", b"keep").unwrap();
        mem
    }

    #[test]
    fn deleted_directory_no_longer_lists() {
        let mem = seeded();
        let lock = ResourceLock::default();
        let mut engine = DeleteEngine::new(&mem, &lock);

        let outcome = engine.delete("ms0:/PSP/GAME", true, &NeverCancel).unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(
            list_dir(&mem, "ms0:/PSP/GAME").unwrap_err().kind(),
            FsErrorKind::NotFound
        );
        assert!(mem.exists("ms0:/PSP/keep.txt"));
        assert_eq!(engine.stats().files_removed, 3);
        assert_eq!(engine.stats().dirs_removed, 2);
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn deletes_on_host() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("SAVE");
        std::fs::create_dir_all(root.join("a").join("b")).unwrap();
        std::fs::write(root.join("a").join("b").join("f"), b"f").unwrap();
        std::fs::write(root.join("top"), b"t").unwrap();

        let host = HostBackend::with_volume("ms0", tmp.path());
        let lock = ResourceLock::default();

        DeleteEngine::new(&host, &lock)
            .delete("ms0:/SAVE", true, &NeverCancel)
            .unwrap();

        assert!(!root.exists());
    }

    #[test]
    fn volume_root_is_refused_untouched() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("vol");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        let host = HostBackend::with_volume("ms0", &root);
        let lock = ResourceLock::default();
        let mut engine = DeleteEngine::new(&host, &lock);

        let err = engine.delete("ms0:/", true, &NeverCancel).unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::InvalidPath);
        assert!(root.join("a.txt").is_file());
        assert!(!engine.stats().removed_any());
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn single_file_delete() {
        let mem = seeded();
        let lock = ResourceLock::default();

        DeleteEngine::new(&mem, &lock)
            .delete("ms0:/PSP/keep.txt", false, &NeverCancel)
            .unwrap();

        assert!(!mem.exists("ms0:/PSP/keep.txt"));

        let err = DeleteEngine::new(&mem, &lock)
            .delete("ms0:/PSP/keep.txt", false, &NeverCancel)
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[test]
    fn misclassified_file_falls_back_to_file_removal() {
        let mem = seeded();
        let lock = ResourceLock::default();

        let outcome = DeleteEngine::new(&mem, &lock)
            .delete("ms0:/PSP/keep.txt", true, &NeverCancel)
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert!(!mem.exists("ms0:/PSP/keep.txt"));
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn cancel_before_first_entry_removes_nothing() {
        let mem = seeded();
        let lock = ResourceLock::default();
        let mut engine = DeleteEngine::new(&mem, &lock);

        let outcome = engine.delete("ms0:/PSP/GAME", true, &|| true).unwrap();

        assert_eq!(outcome, Outcome::Canceled);
        assert!(!engine.stats().removed_any());
        assert!(mem.exists("ms0:/PSP/GAME/EBOOT.PBP"));
    }

    #[test]
    fn cancel_inside_subdirectory_propagates() {
        let mem = seeded();
        let lock = ResourceLock::default();
        let polls = Cell::new(0usize);
        // DATA is enumerated first; stop after its first file is gone
        let cancel = || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        };

        let mut engine = DeleteEngine::new(&mem, &lock);
        let outcome = engine.delete("ms0:/PSP/GAME", true, &cancel).unwrap();

        assert_eq!(outcome, Outcome::Canceled);
        assert!(engine.stats().removed_any());
        assert!(mem.exists("ms0:/PSP/GAME"));
        assert!(mem.exists("ms0:/PSP/GAME/EBOOT.PBP"));
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn remove_failure_aborts_and_reports_partial_progress() {
        let mem = seeded();
        mem.inject_fault("ms0:/PSP/GAME/DATA/b.bin");
        let hook = Arc::new(CountingInhibitor::default());
        let lock = ResourceLock::new(hook.clone());
        let mut engine = DeleteEngine::new(&mem, &lock);

        let err = engine.delete("ms0:/PSP/GAME", true, &NeverCancel).unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::Io);
        assert_eq!(engine.stats().files_removed, 1);
        assert!(!mem.exists("ms0:/PSP/GAME/DATA/a.bin"));
        assert!(mem.exists("ms0:/PSP/GAME/EBOOT.PBP"));
        assert_eq!(lock.depth(), 0);
        assert_eq!(hook.counts(), (1, 1));
    }
}

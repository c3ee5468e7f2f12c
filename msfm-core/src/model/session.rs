//! ``src/model/session.rs``
//! ============================================================================
//! # `FileManager`: one file-management session
//!
//! Owns the storage backend, the resource lock, the clipboard, the current
//! directory and its sorted listing. Everything a presentation layer calls
//! goes through here; the engines in [`crate::operators`] are never reached
//! any other way.

use clipr::{Clipboard, ClipboardOperation, PendingOperation};
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{FsError, FsResult};
use crate::fs::dir_entry::DirEntry;
use crate::fs::dir_scanner::list_dir;
use crate::fs::path::{build_path, file_name, parent_path, split_volume, volume_prefix};
use crate::fs::sort::{SortMode, sort_entries};
use crate::operators::copy::CopyEngine;
use crate::operators::delete::DeleteEngine;
use crate::operators::move_entry::move_entry;
use crate::operators::progress::{CancelPoll, OpStats, Outcome, ProgressSink};
use crate::operators::resource_lock::ResourceLock;
use crate::storage::{self, StorageBackend};

pub struct FileManager {
    backend: Box<dyn StorageBackend>,
    lock: ResourceLock,
    clipboard: Clipboard,
    cwd: String,
    entries: Vec<DirEntry>,
    sort_mode: SortMode,
    last_stats: OpStats,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("backend", &self.backend.name())
            .field("cwd", &self.cwd)
            .field("entries", &self.entries.len())
            .field("sort_mode", &self.sort_mode)
            .field("clipboard", &self.clipboard)
            .finish_non_exhaustive()
    }
}

impl FileManager {
    /// Session with no working directory yet; call
    /// [`change_directory`](Self::change_directory) before relative actions.
    pub fn new(backend: Box<dyn StorageBackend>, sort_mode: SortMode) -> Self {
        Self::with_lock(backend, ResourceLock::default(), sort_mode)
    }

    pub fn with_lock(
        backend: Box<dyn StorageBackend>,
        lock: ResourceLock,
        sort_mode: SortMode,
    ) -> Self {
        Self {
            backend,
            lock,
            clipboard: Clipboard::new(),
            cwd: String::new(),
            entries: Vec::new(),
            sort_mode,
            last_stats: OpStats::default(),
        }
    }

    /// Build the configured backend and open `start_path`, falling back to the
    /// root of its volume when the directory is gone.
    pub fn from_config(cfg: &Config) -> FsResult<Self> {
        let backend: Box<dyn StorageBackend> = storage::from_config(&cfg.storage)?;
        let mut session: Self = Self::new(backend, cfg.sort);

        if let Err(e) = session.change_directory(&cfg.start_path).map(|_| ()) {
            let root: String = volume_prefix(&cfg.start_path)
                .map(|prefix: &str| build_path(prefix, ""))
                .ok_or(e)?;

            warn!(start = %cfg.start_path, root = %root, "Start directory unavailable");
            session.change_directory(&root)?;
        }

        Ok(session)
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub const fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub const fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub const fn lock(&self) -> &ResourceLock {
        &self.lock
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Counters of the most recent paste or delete.
    pub const fn last_stats(&self) -> OpStats {
        self.last_stats
    }

    // ------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------

    /// Listing of `path`, sorted per the session's mode. Leaves `cwd` alone.
    pub fn list_directory(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let mut entries: Vec<DirEntry> = list_dir(self.backend.as_ref(), path)?;
        sort_entries(&mut entries, self.sort_mode);

        Ok(entries)
    }

    /// List `path` and make it the working directory. On failure nothing
    /// changes.
    pub fn change_directory(&mut self, path: &str) -> FsResult<&[DirEntry]> {
        if volume_prefix(path).is_none() {
            return Err(FsError::invalid_path(path, "missing volume prefix"));
        }

        self.entries = self.list_directory(path)?;
        path.clone_into(&mut self.cwd);

        Ok(&self.entries)
    }

    pub fn enter(&mut self, name: &str) -> FsResult<&[DirEntry]> {
        let target: String = build_path(&self.cwd, name);

        self.change_directory(&target)
    }

    pub fn go_parent(&mut self) -> FsResult<&[DirEntry]> {
        let target: String = parent_path(&self.cwd);

        self.change_directory(&target)
    }

    pub fn refresh(&mut self) -> FsResult<&[DirEntry]> {
        let cwd: String = self.cwd.clone();

        self.change_directory(&cwd)
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.sort_mode = mode;
        sort_entries(&mut self.entries, mode);
    }

    pub fn stat(&self, path: &str) -> FsResult<DirEntry> {
        self.backend.stat(path).map_err(|e| FsError::io(path, e))
    }

    // ------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------

    /// Remember `entry` (living in `containing_dir`) for a later
    /// [`paste`](Self::paste) or [`move_pending`](Self::move_pending).
    pub fn set_clipboard(
        &mut self,
        entry: &DirEntry,
        containing_dir: &str,
        operation: ClipboardOperation,
    ) -> FsResult<()> {
        let source: String = build_path(containing_dir, &entry.name);

        self.clipboard
            .set(&source, &entry.name, entry.is_dir, operation)?;

        Ok(())
    }

    /// Copy the pending entry into the working directory. The clipboard is
    /// empty afterwards whatever the result.
    #[instrument(level = "info", skip(self, sink, cancel), fields(cwd = %self.cwd))]
    pub fn paste(
        &mut self,
        sink: &mut dyn ProgressSink,
        cancel: &dyn CancelPoll,
    ) -> FsResult<Outcome> {
        let pending: PendingOperation = self.clipboard.take()?;
        let dest: String = build_path(&self.cwd, pending.display_name());

        let mut engine: CopyEngine<'_> = CopyEngine::new(self.backend.as_ref(), &self.lock);

        let result: FsResult<Outcome> = if pending.is_dir {
            engine.copy_dir(pending.source_path(), &dest, sink, cancel)
        } else {
            engine.copy_file(pending.source_path(), &dest, sink, cancel)
        };

        self.last_stats = engine.stats();
        self.finish("paste", pending.source_path(), result)
    }

    /// Move the pending entry into the working directory with one rename.
    #[instrument(level = "info", skip(self), fields(cwd = %self.cwd))]
    pub fn move_pending(&mut self) -> FsResult<Outcome> {
        let pending: PendingOperation = self.clipboard.take()?;
        let dest: String = build_path(&self.cwd, pending.display_name());

        self.last_stats = OpStats::default();
        let result: FsResult<Outcome> =
            move_entry(self.backend.as_ref(), pending.source_path(), &dest);

        self.finish("move", pending.source_path(), result)
    }

    // ------------------------------------------------------------
    // Mutations in the working directory
    // ------------------------------------------------------------

    /// Delete `entry` from the working directory.
    pub fn delete(&mut self, entry: &DirEntry, cancel: &dyn CancelPoll) -> FsResult<Outcome> {
        let path: String = build_path(&self.cwd, &entry.name);

        self.delete_path(&path, entry.is_dir, cancel)
    }

    #[instrument(level = "info", skip(self, cancel))]
    pub fn delete_path(
        &mut self,
        path: &str,
        is_dir: bool,
        cancel: &dyn CancelPoll,
    ) -> FsResult<Outcome> {
        let mut engine: DeleteEngine<'_> = DeleteEngine::new(self.backend.as_ref(), &self.lock);
        let result: FsResult<Outcome> = engine.delete(path, is_dir, cancel);

        self.last_stats = engine.stats();
        self.finish("delete", path, result)
    }

    /// New empty directory `name` in the working directory.
    pub fn make_dir(&mut self, name: &str) -> FsResult<()> {
        let path: String = self.child_path(name)?;

        self.backend
            .make_dir(&path)
            .map_err(|e| FsError::io(path.as_str(), e))?;

        info!(path = %path, "Directory created");
        self.refresh_quietly();

        Ok(())
    }

    /// New empty file `name` in the working directory; an existing file is
    /// truncated.
    pub fn create_file(&mut self, name: &str) -> FsResult<()> {
        let path: String = self.child_path(name)?;

        {
            let _guard = self.lock.acquire();
            self.backend
                .open_write(&path)
                .map_err(|e| FsError::io(path.as_str(), e))?;
        }

        info!(path = %path, "File created");
        self.refresh_quietly();

        Ok(())
    }

    // ------------------------------------------------------------
    // Quota
    // ------------------------------------------------------------

    /// `volume` may be `ms0`, `ms0:` or any path on the volume.
    pub fn query_free_space(&self, volume: &str) -> FsResult<u64> {
        let name: &str = volume_name(volume);

        self.backend
            .free_space(name)
            .map_err(|e| FsError::io(name, e))
    }

    pub fn query_total_space(&self, volume: &str) -> FsResult<u64> {
        let name: &str = volume_name(volume);

        self.backend
            .total_space(name)
            .map_err(|e| FsError::io(name, e))
    }

    pub fn query_used_space(&self, volume: &str) -> FsResult<u64> {
        let total: u64 = self.query_total_space(volume)?;
        let free: u64 = self.query_free_space(volume)?;

        Ok(total.saturating_sub(free))
    }

    // ------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------

    fn child_path(&self, name: &str) -> FsResult<String> {
        if name.is_empty() || DirEntry::is_pseudo(name) || name.contains(['/', '\\', ':']) {
            return Err(FsError::invalid_path(name, "not a valid entry name"));
        }

        Ok(build_path(&self.cwd, name))
    }

    /// Log the result, then re-list the working directory so the view shows
    /// what actually happened, even after a failure or cancel.
    fn finish(&mut self, op: &str, path: &str, result: FsResult<Outcome>) -> FsResult<Outcome> {
        match &result {
            Ok(outcome) => info!(
                op,
                path,
                %outcome,
                files = self.last_stats.files_copied + self.last_stats.files_removed,
                bytes = self.last_stats.bytes_copied,
                "Operation finished"
            ),

            Err(e) => error!(op, path, error = %e, "Operation failed"),
        }

        self.refresh_quietly();

        result
    }

    fn refresh_quietly(&mut self) {
        if self.cwd.is_empty() {
            return;
        }

        if let Err(e) = self.refresh().map(|_| ()) {
            warn!(cwd = %self.cwd, error = %e, "Could not refresh listing");
        }
    }
}

fn volume_name(volume: &str) -> &str {
    split_volume(volume).map_or_else(|| file_name(volume), |(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::error::FsErrorKind;
    use crate::operators::progress::{NeverCancel, NoProgress, Progress};
    use crate::storage::MemoryBackend;

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn session(capacity: u64) -> (FileManager, MemoryBackend) {
        let mem = MemoryBackend::with_volume("ms0", capacity);
        mem.add_volume("ef0", capacity);
        mem.put_file("ms0:/PSP/GAME/EBOOT.PBP", &[1u8; 400]).unwrap();
        mem.put_file("ms0:/PSP/GAME/DATA/save.bin", &[2u8; 50])
            .unwrap();
        mem.put_file("ms0:/PSP/a.txt", &[3u8; 1000]).unwrap();
        mem.put_file("ms0:/PSP/B.txt", &[4u8; 10]).unwrap();
        mem.put_file("ms0:/MUSIC/song.mp3", &[5u8; 20]).unwrap();
        mem.make_dir("ms0:/BACKUP").unwrap();

        // the session owns a handle onto the same volumes
        let mut fm = FileManager::new(Box::new(mem.clone()), SortMode::NameAscending);
        fm.change_directory("ms0:/PSP").unwrap();

        (fm, mem)
    }

    fn entry(fm: &FileManager, name: &str) -> DirEntry {
        fm.entries()
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .unwrap()
    }

    #[test]
    fn navigation_keeps_sorted_listing() {
        let (mut fm, _mem) = session(1 << 20);
        assert_eq!(names(fm.entries()), ["GAME", "a.txt", "B.txt"]);

        fm.set_sort_mode(SortMode::SizeAscending);
        assert_eq!(names(fm.entries()), ["GAME", "B.txt", "a.txt"]);

        fm.enter("GAME").unwrap();
        assert_eq!(fm.cwd(), "ms0:/PSP/GAME");
        assert_eq!(names(fm.entries()), ["DATA", "EBOOT.PBP"]);

        fm.go_parent().unwrap();
        fm.go_parent().unwrap();
        assert_eq!(fm.cwd(), "ms0:/");
        fm.go_parent().unwrap();
        assert_eq!(fm.cwd(), "ms0:/");
    }

    #[test]
    fn failed_change_directory_keeps_state() {
        let (mut fm, _mem) = session(1 << 20);

        let err = fm.change_directory("ms0:/nope").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
        assert_eq!(fm.cwd(), "ms0:/PSP");
        assert_eq!(fm.entries().len(), 3);

        let err = fm.change_directory("PSP").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidPath);
    }

    #[test]
    fn second_paste_reports_nothing_pending() {
        let (mut fm, mem) = session(1 << 20);
        let game = entry(&fm, "GAME");
        fm.set_clipboard(&game, "ms0:/PSP", ClipboardOperation::Copy)
            .unwrap();

        fm.change_directory("ms0:/BACKUP").unwrap();
        let outcome = fm.paste(&mut NoProgress, &NeverCancel).unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert!(fm.clipboard().is_empty());
        assert_eq!(names(fm.entries()), ["GAME"]);
        assert_eq!(mem.read_all("ms0:/BACKUP/GAME/DATA/save.bin").unwrap(), vec![2u8; 50]);
        assert_eq!(fm.last_stats().files_copied, 2);

        let err = fm.paste(&mut NoProgress, &NeverCancel).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NothingPending);

        let err = fm.move_pending().unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NothingPending);
    }

    #[test]
    fn failed_paste_still_clears_clipboard() {
        // 1480 bytes used of 2000: a.txt (1000) does not fit again
        let (mut fm, mem) = session(2000);
        let a = entry(&fm, "a.txt");
        fm.set_clipboard(&a, "ms0:/PSP", ClipboardOperation::Copy)
            .unwrap();
        fm.change_directory("ms0:/BACKUP").unwrap();

        let err = fm.paste(&mut NoProgress, &NeverCancel).unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::InsufficientStorage);
        assert!(fm.clipboard().is_empty());
        assert!(!mem.exists("ms0:/BACKUP/a.txt"));
        assert_eq!(fm.lock().depth(), 0);
    }

    #[test]
    fn paste_into_source_directory_keeps_source() {
        let (mut fm, mem) = session(1 << 20);
        let a = entry(&fm, "a.txt");
        fm.set_clipboard(&a, "ms0:/PSP", ClipboardOperation::Copy)
            .unwrap();

        let err = fm.paste(&mut NoProgress, &NeverCancel).unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::InvalidPath);
        assert_eq!(mem.read_all("ms0:/PSP/a.txt").unwrap(), vec![3u8; 1000]);
        assert!(fm.clipboard().is_empty());
    }

    #[test]
    fn paste_reports_progress() {
        let (mut fm, _mem) = session(1 << 20);
        let a = entry(&fm, "a.txt");
        fm.set_clipboard(&a, "ms0:/PSP", ClipboardOperation::Copy)
            .unwrap();
        fm.change_directory("ms0:/BACKUP").unwrap();

        let mut seen: Vec<Progress> = Vec::new();
        let mut sink = |p: &Progress| seen.push(p.clone());
        fm.paste(&mut sink, &NeverCancel).unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].label, "a.txt");
        assert_eq!((seen[0].offset, seen[0].total), (1000, 1000));
    }

    #[test]
    fn move_within_and_across_volumes() {
        let (mut fm, mem) = session(1 << 20);

        let b = entry(&fm, "B.txt");
        fm.set_clipboard(&b, "ms0:/PSP", ClipboardOperation::Cut)
            .unwrap();
        fm.change_directory("ms0:/BACKUP").unwrap();
        assert_eq!(fm.move_pending().unwrap(), Outcome::Completed);
        assert_eq!(names(fm.entries()), ["B.txt"]);
        assert!(!mem.exists("ms0:/PSP/B.txt"));

        fm.change_directory("ms0:/PSP").unwrap();
        let a = entry(&fm, "a.txt");
        fm.set_clipboard(&a, "ms0:/PSP", ClipboardOperation::Cut)
            .unwrap();
        fm.change_directory("ef0:/").unwrap();

        let err = fm.move_pending().unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::CrossDeviceMoveUnsupported);
        assert!(fm.clipboard().is_empty());
        assert!(mem.exists("ms0:/PSP/a.txt"));
        assert!(fm.entries().is_empty());
    }

    #[test]
    fn delete_entry_updates_listing_and_stats() {
        let (mut fm, _mem) = session(1 << 20);
        let game = entry(&fm, "GAME");

        let outcome = fm.delete(&game, &NeverCancel).unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(names(fm.entries()), ["a.txt", "B.txt"]);
        assert_eq!(fm.last_stats().files_removed, 2);
        assert_eq!(fm.last_stats().dirs_removed, 2);
        assert_eq!(
            fm.list_directory("ms0:/PSP/GAME").unwrap_err().kind(),
            FsErrorKind::NotFound
        );
    }

    #[test]
    fn make_dir_and_create_file() {
        let (mut fm, mem) = session(1 << 20);

        fm.make_dir("SAVEDATA").unwrap();
        fm.create_file("notes.txt").unwrap();

        assert_eq!(names(fm.entries()), ["GAME", "SAVEDATA", "a.txt", "B.txt", "notes.txt"]);
        assert!(mem.read_all("ms0:/PSP/notes.txt").unwrap().is_empty());

        let err = fm.make_dir("SAVEDATA").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::Io);

        let err = fm.make_dir("..").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidPath);
    }

    #[test]
    fn quota_queries_accept_any_volume_spelling() {
        let (fm, _mem) = session(4096);

        assert_eq!(fm.query_total_space("ms0").unwrap(), 4096);
        assert_eq!(fm.query_used_space("ms0:").unwrap(), 1480);
        assert_eq!(fm.query_free_space("ms0:/PSP").unwrap(), 4096 - 1480);
        assert_eq!(fm.query_free_space("ef0").unwrap(), 4096);

        let err = fm.query_free_space("xx0").unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[test]
    fn from_config_falls_back_to_volume_root() {
        let mut cfg = Config::default();
        cfg.storage.backend = BackendKind::Memory;
        cfg.storage.volumes.clear();
        cfg.start_path = "ms0:/PSP/GAME".to_string();
        cfg.sort = SortMode::NameDescending;

        let fm = FileManager::from_config(&cfg).unwrap();

        assert_eq!(fm.cwd(), "ms0:/");
        assert_eq!(fm.sort_mode(), SortMode::NameDescending);
        assert!(fm.entries().is_empty());
    }
}

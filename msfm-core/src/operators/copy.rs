//! ``src/operators/copy.rs``
//! ============================================================================
//! # `CopyEngine`: chunked, cancellable, quota-checked copies
//!
//! Files are copied in [`CHUNK_SIZE`] chunks. Cancellation is polled before
//! every chunk and once per directory entry; progress is reported after every
//! chunk. A directory copy stops at the first failing or canceled child and
//! leaves whatever was already written in place.

use std::io::{ErrorKind, Seek, SeekFrom, Write};

use tracing::{debug, instrument, trace, warn};

use crate::error::{FsError, FsResult};
use crate::fs::dir_entry::DirEntry;
use crate::fs::path::{build_path, file_name, is_within, same_entry, split_volume};
use crate::operators::progress::{CancelPoll, OpStats, Outcome, Progress, ProgressSink};
use crate::operators::resource_lock::{ResourceGuard, ResourceLock};
use crate::storage::{ReadSeek, StorageBackend};

pub const CHUNK_SIZE: usize = 64 * 1024;

pub struct CopyEngine<'a> {
    backend: &'a dyn StorageBackend,
    lock: &'a ResourceLock,
    stats: OpStats,
    op_id: String,
}

impl<'a> CopyEngine<'a> {
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

    /// Copy one file. The destination is created or truncated, never appended
    /// to. Fails with [`FsError::InsufficientStorage`] before touching the
    /// destination when its volume cannot hold the source, and with
    /// [`FsError::InvalidPath`] when `dest` names `src` itself.
    #[instrument(level = "debug", skip(self, sink, cancel), fields(op_id = %self.op_id))]
    pub fn copy_file(
        &mut self,
        src: &str,
        dest: &str,
        sink: &mut dyn ProgressSink,
        cancel: &dyn CancelPoll,
    ) -> FsResult<Outcome> {
        // truncating the destination would empty the source
        if same_entry(src, dest) {
            return Err(FsError::invalid_path(dest, "destination is the source file"));
        }

        let _guard: ResourceGuard<'_> = self.lock.acquire();

        let mut reader: Box<dyn ReadSeek> = self
            .backend
            .open_read(src)
            .map_err(|e| FsError::io(src, e))?;

        let total: u64 = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| FsError::io(src, e))?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| FsError::io(src, e))?;

        let (volume, _) = split_volume(dest)
            .ok_or_else(|| FsError::invalid_path(dest, "missing volume prefix"))?;

        // an existing destination is truncated, so its bytes count as free
        let reclaimed: u64 = match self.backend.stat(dest) {
            Ok(existing) if !existing.is_dir => existing.size,
            _ => 0,
        };

        let available: u64 = self
            .backend
            .free_space(volume)
            .map_err(|e| FsError::io(dest, e))?
            .saturating_add(reclaimed);

        if available < total {
            warn!(
                required = total,
                available, "Not enough free space on destination volume"
            );

            return Err(FsError::InsufficientStorage {
                path: dest.to_string(),
                required: total,
                available,
            });
        }

        let mut writer: Box<dyn Write + Send> = self
            .backend
            .open_write(dest)
            .map_err(|e| FsError::io(dest, e))?;

        let label: &str = file_name(src);
        let mut buf: Vec<u8> = vec![0u8; CHUNK_SIZE];
        let mut offset: u64 = 0;

        while offset < total {
            if cancel.is_canceled() {
                debug!(offset, total, "Copy canceled, partial destination left");

                return Ok(Outcome::Canceled);
            }

            let want: usize = usize::try_from(total - offset).map_or(CHUNK_SIZE, |left: usize| {
                left.min(CHUNK_SIZE)
            });

            let read: usize = read_chunk(reader.as_mut(), &mut buf[..want])
                .map_err(|e| FsError::io(src, e))?;

            writer
                .write_all(&buf[..read])
                .map_err(|e| FsError::io(dest, e))?;

            offset += read as u64;
            self.stats.bytes_copied += read as u64;

            sink.report(&Progress::new(label, offset, total));
        }

        writer.flush().map_err(|e| FsError::io(dest, e))?;
        self.stats.files_copied += 1;

        debug!(bytes = total, "File copied");

        Ok(Outcome::Completed)
    }

    /// Copy a directory tree. An existing `dest` directory is reused.
    #[instrument(level = "debug", skip(self, sink, cancel), fields(op_id = %self.op_id))]
    pub fn copy_dir(
        &mut self,
        src: &str,
        dest: &str,
        sink: &mut dyn ProgressSink,
        cancel: &dyn CancelPoll,
    ) -> FsResult<Outcome> {
        if is_within(src, dest) {
            return Err(FsError::invalid_path(
                dest,
                "destination lies inside the source directory",
            ));
        }

        let _guard: ResourceGuard<'_> = self.lock.acquire();
        let backend: &'a dyn StorageBackend = self.backend;

        let children = backend.read_dir(src).map_err(|e| FsError::io(src, e))?;

        match backend.make_dir(dest) {
            Ok(()) => self.stats.dirs_created += 1,

            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                trace!("Destination directory already exists");
            }

            // best effort: the first child write reports the real failure
            Err(e) => warn!(error = %e, "Could not create destination directory"),
        }

        for entry in children {
            if cancel.is_canceled() {
                debug!("Directory copy canceled");

                return Ok(Outcome::Canceled);
            }

            let entry: DirEntry = entry.map_err(|e| FsError::io(src, e))?;

            if DirEntry::is_pseudo(&entry.name) {
                continue;
            }

            let child_src: String = build_path(src, &entry.name);
            let child_dest: String = build_path(dest, &entry.name);

            let outcome: Outcome = if entry.is_dir {
                self.copy_dir(&child_src, &child_dest, sink, cancel)?
            } else {
                self.copy_file(&child_src, &child_dest, sink, cancel)?
            };

            if outcome == Outcome::Canceled {
                return Ok(Outcome::Canceled);
            }
        }

        Ok(Outcome::Completed)
    }
}

/// One read, retried on `Interrupted`. Zero bytes before the expected end is
/// an error: the source shrank under us.
fn read_chunk(reader: &mut dyn ReadSeek, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::UnexpectedEof)),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

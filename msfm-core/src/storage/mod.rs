//! ``src/storage/mod.rs``
//!
//! # `StorageBackend`: the only I/O surface the engine touches
//!
//! Paths handed to a backend are full device paths (`ms0:/PSP/a.txt`). The
//! backend resolves the volume itself. Exactly one backend is chosen at
//! start-up from [`StorageConfig`] and lives for the whole session.

use std::io::{self, Read, Seek, Write};

use tracing::{debug, info};

use crate::config::{BackendKind, StorageConfig};
use crate::error::{FsError, FsResult};
use crate::fs::dir_entry::DirEntry;

pub mod host;
pub mod memory;

pub use host::HostBackend;
pub use memory::MemoryBackend;

/// Readable and seekable source handle.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Open enumeration handle. Dropping it closes the directory.
pub type EntryIter<'a> = Box<dyn Iterator<Item = io::Result<DirEntry>> + Send + 'a>;

pub trait StorageBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>>;

    /// Open for writing, creating the file if absent and truncating it if not.
    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>>;

    fn stat(&self, path: &str) -> io::Result<DirEntry>;

    fn read_dir<'a>(&'a self, path: &str) -> io::Result<EntryIter<'a>>;

    fn make_dir(&self, path: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &str) -> io::Result<()>;

    /// Atomic rename inside a single volume.
    fn rename(&self, src: &str, dest: &str) -> io::Result<()>;

    /// Free bytes on `volume` (name without the trailing ':').
    fn free_space(&self, volume: &str) -> io::Result<u64>;

    fn total_space(&self, volume: &str) -> io::Result<u64>;

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }
}

/// Build the backend selected by configuration.
pub fn from_config(cfg: &StorageConfig) -> FsResult<Box<dyn StorageBackend>> {
    let backend: Box<dyn StorageBackend> = match cfg.backend {
        BackendKind::Host => {
            if cfg.volumes.is_empty() {
                return Err(FsError::Config(
                    "host backend needs at least one entry under [storage.volumes]".into(),
                ));
            }

            for (name, root) in &cfg.volumes {
                std::fs::create_dir_all(root)
                    .map_err(|e| FsError::io(root.display().to_string(), e))?;

                debug!(volume = %name, root = %root.display(), "Host volume mounted");
            }

            Box::new(HostBackend::new(cfg.volumes.clone()))
        }

        BackendKind::Memory => {
            let backend: MemoryBackend = MemoryBackend::new();

            let names: Vec<&str> = if cfg.volumes.is_empty() {
                vec!["ms0"]
            } else {
                cfg.volumes.keys().map(String::as_str).collect()
            };

            for name in names {
                backend.add_volume(name, cfg.memory_capacity);
            }

            Box::new(backend)
        }
    };

    info!(backend = backend.name(), "Storage backend selected");

    Ok(backend)
}

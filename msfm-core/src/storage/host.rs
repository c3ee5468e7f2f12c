//! Host filesystem backend: each volume name maps onto a directory.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use super::{EntryIter, ReadSeek, StorageBackend};
use crate::fs::dir_entry::DirEntry;
use crate::fs::path::{file_name, is_volume_root, split_volume};

#[derive(Debug, Clone)]
pub struct HostBackend {
    volumes: BTreeMap<String, PathBuf>,
}

impl HostBackend {
    pub fn new(volumes: BTreeMap<String, PathBuf>) -> Self {
        Self { volumes }
    }

    pub fn with_volume<P: Into<PathBuf>>(name: &str, root: P) -> Self {
        let mut volumes: BTreeMap<String, PathBuf> = BTreeMap::new();
        volumes.insert(name.to_string(), root.into());

        Self { volumes }
    }

    fn volume_root(&self, volume: &str) -> io::Result<&Path> {
        self.volumes
            .get(volume)
            .map(PathBuf::as_path)
            .ok_or_else(|| -> io::Error {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("unknown volume {volume:?}"),
                )
            })
    }

    /// Map a device path onto the host, refusing to climb above the volume root.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let (volume, rest) = split_volume(path).ok_or_else(|| -> io::Error {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("missing volume prefix: {path:?}"),
            )
        })?;

        let mut out: PathBuf = self.volume_root(volume)?.to_path_buf();

        for segment in rest.split('/').filter(|s: &&str| !s.is_empty() && *s != ".") {
            if segment == ".." {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("path escapes volume root: {path:?}"),
                ));
            }

            out.push(segment);
        }

        trace!(device_path = path, host_path = %out.display(), "Resolved path");

        Ok(out)
    }
}

impl StorageBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn ReadSeek>> {
        let file: File = File::open(self.resolve(path)?)?;

        Ok(Box::new(file))
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        let file: File = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.resolve(path)?)?;

        Ok(Box::new(file))
    }

    fn stat(&self, path: &str) -> io::Result<DirEntry> {
        let meta: fs::Metadata = fs::metadata(self.resolve(path)?)?;

        Ok(DirEntry::from_metadata(file_name(path), &meta))
    }

    fn read_dir<'a>(&'a self, path: &str) -> io::Result<EntryIter<'a>> {
        let read_dir: fs::ReadDir = fs::read_dir(self.resolve(path)?)?;

        let iter = read_dir.map(|entry: io::Result<fs::DirEntry>| -> io::Result<DirEntry> {
            let entry: fs::DirEntry = entry?;
            let meta: fs::Metadata = entry.metadata()?;
            let name: String = entry.file_name().to_string_lossy().into_owned();

            Ok(DirEntry::from_metadata(&name, &meta))
        });

        Ok(Box::new(iter))
    }

    fn make_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.resolve(path)?)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path)?)
    }

    fn remove_dir(&self, path: &str) -> io::Result<()> {
        if is_volume_root(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("refusing to remove volume root: {path:?}"),
            ));
        }

        fs::remove_dir(self.resolve(path)?)
    }

    /// Never replaces an existing `dest`.
    fn rename(&self, src: &str, dest: &str) -> io::Result<()> {
        let from: PathBuf = self.resolve(src)?;
        let to: PathBuf = self.resolve(dest)?;

        match fs::symlink_metadata(&to) {
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination exists: {dest:?}"),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::rename(from, to),
            Err(e) => Err(e),
        }
    }

    fn free_space(&self, volume: &str) -> io::Result<u64> {
        statvfs::free_bytes(self.volume_root(volume)?)
    }

    fn total_space(&self, volume: &str) -> io::Result<u64> {
        statvfs::total_bytes(self.volume_root(volume)?)
    }
}

#[cfg(unix)]
mod statvfs {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    fn query(path: &Path) -> io::Result<libc::statvfs> {
        let c_path: CString = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

        // SAFETY: `c_path` is NUL-terminated and `stat` is a valid out-pointer.
        let rc: libc::c_int = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };

        if rc == 0 {
            Ok(stat)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[allow(clippy::unnecessary_cast, reason = "field widths differ per platform")]
    pub(super) fn free_bytes(path: &Path) -> io::Result<u64> {
        let stat: libc::statvfs = query(path)?;

        Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    }

    #[allow(clippy::unnecessary_cast, reason = "field widths differ per platform")]
    pub(super) fn total_bytes(path: &Path) -> io::Result<u64> {
        let stat: libc::statvfs = query(path)?;

        Ok((stat.f_blocks as u64).saturating_mul(stat.f_frsize as u64))
    }
}

#[cfg(not(unix))]
mod statvfs {
    use std::io;
    use std::path::Path;

    pub(super) fn free_bytes(_path: &Path) -> io::Result<u64> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn total_bytes(_path: &Path) -> io::Result<u64> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

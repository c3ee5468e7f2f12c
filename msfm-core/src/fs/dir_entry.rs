//! `src/fs/dir_entry.rs`
//! ============================================================
//! Directory entry metadata as shown by the file manager.
//!
//! An entry is built once per listing from a single metadata capture and is
//! never mutated afterwards.

use std::fs::Metadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytesize::ByteSize;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::fs::path::{FileCategory, classify_extension};

// ------------------------------------------------------------
// Mode — rwx bits for owner/group/other plus directory flag.
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode(u32);

impl Mode {
    pub const DIR: u32 = 0o040_000;
    pub const PERM_MASK: u32 = 0o777;

    pub const fn new(perm: u32, is_dir: bool) -> Self {
        let bits: u32 = perm & Self::PERM_MASK;

        if is_dir {
            Self(bits | Self::DIR)
        } else {
            Self(bits)
        }
    }

    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.0 & Self::DIR != 0
    }

    /// `ls`-style rendering, e.g. `drwxr-xr-x`.
    #[must_use]
    pub fn permission_string(&self) -> String {
        const FLAGS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];

        let mut out: String = String::with_capacity(10);
        out.push(if self.is_dir() { 'd' } else { '-' });

        for (bit, ch) in FLAGS {
            out.push(if self.0 & bit != 0 { ch } else { '-' });
        }

        out
    }

    #[cfg(unix)]
    fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;

        Self::new(meta.permissions().mode(), meta.is_dir())
    }

    #[cfg(not(unix))]
    fn from_metadata(meta: &Metadata) -> Self {
        let perm: u32 = if meta.permissions().readonly() { 0o555 } else { 0o777 };

        Self::new(perm, meta.is_dir())
    }
}

// ------------------------------------------------------------
// Timestamp — minute resolution, local time.
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl Timestamp {
    #[allow(clippy::cast_possible_wrap, reason = "Seconds since epoch fit in i64")]
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let dur: Duration = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| -> Duration { Duration::from_secs(0) });

        let Some(dt) = Local.timestamp_opt(dur.as_secs() as i64, 0).single() else {
            return Self::default();
        };

        Self::from_datetime(&dt)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_datetime(dt: &DateTime<Local>) -> Self {
        Self {
            year: dt.year().max(0) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{} {:>2}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

// ------------------------------------------------------------
// DirEntry
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: CompactString,
    pub is_dir: bool,
    /// Byte length; always 0 for directories.
    pub size: u64,
    pub mode: Mode,
    pub created: Timestamp,
    pub accessed: Timestamp,
    pub modified: Timestamp,
}

impl DirEntry {
    /// Build from one metadata capture. Platforms without a birth time fall
    /// back to the modification time.
    pub fn from_metadata(name: &str, meta: &Metadata) -> Self {
        let is_dir: bool = meta.is_dir();
        let modified: SystemTime = meta.modified().unwrap_or(UNIX_EPOCH);
        let accessed: SystemTime = meta.accessed().unwrap_or(modified);
        let created: SystemTime = meta.created().unwrap_or(modified);

        Self {
            name: CompactString::new(name),
            is_dir,
            size: if is_dir { 0 } else { meta.len() },
            mode: Mode::from_metadata(meta),
            created: Timestamp::from_system_time(created),
            accessed: Timestamp::from_system_time(accessed),
            modified: Timestamp::from_system_time(modified),
        }
    }

    #[inline]
    #[must_use]
    pub fn category(&self) -> FileCategory {
        if self.is_dir {
            FileCategory::None
        } else {
            classify_extension(&self.name)
        }
    }

    #[inline]
    #[must_use]
    pub fn size_human(&self) -> String {
        ByteSize::b(self.size).to_string()
    }

    #[inline]
    #[must_use]
    pub fn is_pseudo(name: &str) -> bool {
        name == "." || name == ".."
    }
}

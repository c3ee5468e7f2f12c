//! ``src/fs/sort.rs``
//!
//! Directory-first ordering of listed entries.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::fs::dir_entry::DirEntry;

/// Persisted as its integer value (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SortMode {
    #[default]
    NameAscending,
    NameDescending,
    SizeDescending,
    SizeAscending,
}

impl SortMode {
    pub const ALL: [Self; 4] = [
        Self::NameAscending,
        Self::NameDescending,
        Self::SizeDescending,
        Self::SizeAscending,
    ];
}

impl TryFrom<u8> for SortMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NameAscending),
            1 => Ok(Self::NameDescending),
            2 => Ok(Self::SizeDescending),
            3 => Ok(Self::SizeAscending),
            other => Err(format!("unknown sort mode {other}, expected 0..=3")),
        }
    }
}

impl From<SortMode> for u8 {
    fn from(mode: SortMode) -> Self {
        match mode {
            SortMode::NameAscending => 0,
            SortMode::NameDescending => 1,
            SortMode::SizeDescending => 2,
            SortMode::SizeAscending => 3,
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &'static str = match self {
            Self::NameAscending => "name_asc",
            Self::NameDescending => "name_desc",
            Self::SizeDescending => "size_desc",
            Self::SizeAscending => "size_asc",
        };

        write!(f, "{s}")
    }
}

/// ASCII case-insensitive comparison, same ordering as `strcasecmp`.
fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c: u8| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c: u8| c.to_ascii_lowercase()))
}

#[must_use]
pub fn compare(a: &DirEntry, b: &DirEntry, mode: SortMode) -> Ordering {
    // Directories first
    match (a.is_dir, b.is_dir) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    match mode {
        SortMode::NameAscending => cmp_ignore_case(&a.name, &b.name),
        SortMode::NameDescending => cmp_ignore_case(&b.name, &a.name),

        // Directory sizes carry no meaning; keep them in enumeration order.
        SortMode::SizeDescending if a.is_dir => Ordering::Equal,
        SortMode::SizeAscending if a.is_dir => Ordering::Equal,
        SortMode::SizeDescending => b.size.cmp(&a.size),
        SortMode::SizeAscending => a.size.cmp(&b.size),
    }
}

/// Stable in-place sort; ties keep enumeration order.
pub fn sort_entries(entries: &mut [DirEntry], mode: SortMode) {
    entries.sort_by(|a: &DirEntry, b: &DirEntry| -> Ordering { compare(a, b, mode) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::dir_entry::{Mode, Timestamp};
    use compact_str::CompactString;

    fn entry(name: &str, is_dir: bool, size: u64) -> DirEntry {
        DirEntry {
            name: CompactString::new(name),
            is_dir,
            size,
            mode: Mode::new(0o755, is_dir),
            created: Timestamp::default(),
            accessed: Timestamp::default(),
            modified: Timestamp::default(),
        }
    }

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample() -> Vec<DirEntry> {
        vec![
            entry("zeta.txt", false, 10),
            entry("GAME", true, 0),
            entry("Alpha.txt", false, 300),
            entry("beta.txt", false, 10),
            entry("apps", true, 0),
            entry("Mid.bin", false, 50),
        ]
    }

    #[test]
    fn directories_first_for_every_mode() {
        for mode in SortMode::ALL {
            let mut entries = sample();
            sort_entries(&mut entries, mode);

            let first_file = entries.iter().position(|e| !e.is_dir).unwrap();
            assert!(entries[..first_file].iter().all(|e| e.is_dir), "{mode}");
            assert!(entries[first_file..].iter().all(|e| !e.is_dir), "{mode}");
        }
    }

    #[test]
    fn name_modes_ignore_case() {
        let mut entries = sample();
        sort_entries(&mut entries, SortMode::NameAscending);
        assert_eq!(
            names(&entries),
            ["apps", "GAME", "Alpha.txt", "beta.txt", "Mid.bin", "zeta.txt"]
        );

        sort_entries(&mut entries, SortMode::NameDescending);
        assert_eq!(
            names(&entries),
            ["GAME", "apps", "zeta.txt", "Mid.bin", "beta.txt", "Alpha.txt"]
        );
    }

    #[test]
    fn name_sort_is_stable_on_case_ties() {
        let mut entries = vec![entry("readme", false, 1), entry("README", false, 2)];
        sort_entries(&mut entries, SortMode::NameAscending);
        assert_eq!(names(&entries), ["readme", "README"]);
    }

    #[test]
    fn size_modes_keep_directory_enumeration_order() {
        let mut entries = sample();
        sort_entries(&mut entries, SortMode::SizeDescending);
        assert_eq!(
            names(&entries),
            ["GAME", "apps", "Alpha.txt", "Mid.bin", "zeta.txt", "beta.txt"]
        );

        let mut entries = sample();
        sort_entries(&mut entries, SortMode::SizeAscending);
        assert_eq!(
            names(&entries),
            ["GAME", "apps", "zeta.txt", "beta.txt", "Mid.bin", "Alpha.txt"]
        );
    }

    #[test]
    fn sort_mode_integer_mapping() {
        assert_eq!(SortMode::try_from(2u8), Ok(SortMode::SizeDescending));
        assert!(SortMode::try_from(4u8).is_err());
        assert_eq!(u8::from(SortMode::SizeAscending), 3);
    }
}

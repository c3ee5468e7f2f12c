//! `src/fs/path.rs`
//!
//! String paths of the form `<volume>:/<segment>/<segment>`. Everything here
//! is pure: no I/O, no allocation beyond the returned values.

use serde::{Deserialize, Serialize};

pub const SEPARATOR: char = '/';

/// Broad category of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    Application,
    Archive,
    Audio,
    Image,
    Text,
    None,
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &'static str = match self {
            Self::Application => "application",
            Self::Archive => "archive",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Text => "text",
            Self::None => "none",
        };

        write!(f, "{s}")
    }
}

const CATEGORY_TABLE: &[(FileCategory, &[&str])] = &[
    (FileCategory::Application, &["cso", "iso", "pbp"]),
    (FileCategory::Archive, &["7z", "lzma", "rar", "tar", "zip"]),
    (
        FileCategory::Audio,
        &["flac", "it", "mod", "mp3", "ogg", "opus", "s3m", "wav", "xm"],
    ),
    (
        FileCategory::Image,
        &[
            "bmp", "gif", "jpg", "jpeg", "pgm", "ppm", "png", "psd", "tga", "tif", "tiff",
        ],
    ),
    (
        FileCategory::Text,
        &["cfg", "conf", "ini", "json", "log", "md", "txt"],
    ),
];

/// Join `segment` onto `base` with exactly one separator between them.
#[must_use]
pub fn build_path(base: &str, segment: &str) -> String {
    let mut out: String = String::with_capacity(base.len() + 1 + segment.len());
    out.push_str(base);

    if !base.is_empty() && !base.ends_with(SEPARATOR) {
        out.push(SEPARATOR);
    }

    out.push_str(segment);
    out
}

/// Substring after the last '.', or "" when there is none.
#[must_use]
pub fn get_extension(path: &str) -> &str {
    path.rfind('.').map_or("", |idx: usize| -> &str { &path[idx + 1..] })
}

#[must_use]
pub fn classify_extension(path: &str) -> FileCategory {
    let ext: &str = get_extension(path);

    if ext.is_empty() {
        return FileCategory::None;
    }

    CATEGORY_TABLE
        .iter()
        .find(|(_, exts)| exts.iter().any(|e: &&str| e.eq_ignore_ascii_case(ext)))
        .map_or(FileCategory::None, |(category, _)| *category)
}

/// Device identifier up to and including the first ':'.
#[must_use]
pub fn volume_prefix(path: &str) -> Option<&str> {
    path.find(':').map(|idx: usize| -> &str { &path[..=idx] })
}

/// Split into volume name (without ':') and the volume-relative remainder,
/// stripped of leading separators.
#[must_use]
pub fn split_volume(path: &str) -> Option<(&str, &str)> {
    let idx: usize = path.find(':')?;
    let volume: &str = &path[..idx];
    let rest: &str = path[idx + 1..].trim_start_matches(SEPARATOR);

    Some((volume, rest))
}

/// Last path component (after the last '/' or '\\').
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed: &str = path.trim_end_matches(SEPARATOR);

    trimmed
        .rfind(['/', '\\'])
        .map_or(trimmed, |idx: usize| -> &str { &trimmed[idx + 1..] })
}

/// Parent directory. A parent ending in ':' gets a trailing separator, and the
/// root of a volume is its own parent.
#[must_use]
pub fn parent_path(path: &str) -> String {
    let trimmed: &str = path.trim_end_matches(SEPARATOR);

    let Some(idx) = trimmed.rfind(SEPARATOR) else {
        // "ms0:" or "ms0:/" or a bare name
        return match volume_prefix(path) {
            Some(prefix) => build_path(prefix, ""),
            None => path.to_string(),
        };
    };

    let parent: &str = &trimmed[..idx];

    if parent.ends_with(':') {
        format!("{parent}{SEPARATOR}")
    } else if parent.is_empty() {
        SEPARATOR.to_string()
    } else {
        parent.to_string()
    }
}

/// True when `candidate` is `root` itself or lies below it.
#[must_use]
pub fn is_within(root: &str, candidate: &str) -> bool {
    let root: &str = root.trim_end_matches(SEPARATOR);
    let candidate: &str = candidate.trim_end_matches(SEPARATOR);

    candidate == root
        || (candidate.starts_with(root)
            && candidate[root.len()..].starts_with(SEPARATOR))
}

/// Volume-relative components, skipping empty and `.` segments.
fn components(rest: &str) -> impl Iterator<Item = &str> {
    rest.split(SEPARATOR)
        .filter(|s: &&str| !s.is_empty() && *s != ".")
}

/// True when both paths name the same entry, ignoring repeated and trailing
/// separators.
#[must_use]
pub fn same_entry(a: &str, b: &str) -> bool {
    match (split_volume(a), split_volume(b)) {
        (Some((vol_a, rest_a)), Some((vol_b, rest_b))) => {
            vol_a == vol_b && components(rest_a).eq(components(rest_b))
        }
        (None, None) => components(a).eq(components(b)),
        _ => false,
    }
}

/// True for the root of a volume: `ms0:`, `ms0:/`, `ms0://.`
#[must_use]
pub fn is_volume_root(path: &str) -> bool {
    split_volume(path).is_some_and(|(_, rest)| components(rest).next().is_none())
}

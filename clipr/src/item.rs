use crate::error::{ClipError, ClipResult};
use compact_str::CompactString;

/// What the user asked for when the entry was put on the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

impl std::fmt::Display for ClipboardOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &'static str = match self {
            Self::Copy => "copy",
            Self::Cut => "cut",
        };

        write!(f, "{s}")
    }
}

/// The single recorded copy-or-cut source awaiting a paste or move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub source_path: CompactString,
    pub display_name: CompactString,
    pub is_dir: bool,
    pub operation: ClipboardOperation,
}

impl PendingOperation {
    pub fn new(
        source_path: &str,
        display_name: &str,
        is_dir: bool,
        operation: ClipboardOperation,
    ) -> ClipResult<Self> {
        if source_path.is_empty() {
            return Err(ClipError::invalid_path(source_path));
        }

        if display_name.is_empty() || display_name == "." || display_name == ".." {
            return Err(ClipError::invalid_name(display_name));
        }

        Ok(Self {
            source_path: CompactString::from(source_path),
            display_name: CompactString::from(display_name),
            is_dir,
            operation,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }
}

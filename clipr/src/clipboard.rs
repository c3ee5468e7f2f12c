use crate::error::{ClipError, ClipResult};
use crate::item::{ClipboardOperation, PendingOperation};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    pending: Option<PendingOperation>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry for a later paste/move, replacing whatever was pending.
    pub fn set(
        &mut self,
        source_path: &str,
        display_name: &str,
        is_dir: bool,
        operation: ClipboardOperation,
    ) -> ClipResult<()> {
        let item: PendingOperation =
            PendingOperation::new(source_path, display_name, is_dir, operation)?;

        if let Some(previous) = self.pending.replace(item) {
            debug!(
                replaced = %previous.source_path,
                source = source_path,
                "Replaced pending clipboard operation"
            );
        } else {
            debug!(source = source_path, op = %operation, "Clipboard set");
        }

        Ok(())
    }

    /// Hand the pending operation to the caller, leaving the clipboard empty.
    pub fn take(&mut self) -> ClipResult<PendingOperation> {
        self.pending.take().ok_or(ClipError::NothingPending)
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

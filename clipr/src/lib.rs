//! # clipr - Pending-Operation Clipboard for File Managers
//!
//! A single-slot clipboard recording which entry the user copied or cut,
//! waiting to be consumed by a paste or move.
//!
//! ## Key Features
//! - At most one pending operation; a new `set` replaces the old one
//! - `take` hands the operation to the caller and clears the slot in one step
//! - Owned by the file-manager session, no process-wide state

pub mod clipboard;
pub mod error;
pub mod item;

// Re-export main types for easy use
pub use clipboard::Clipboard;
pub use error::{ClipError, ClipResult};
pub use item::{ClipboardOperation, PendingOperation};

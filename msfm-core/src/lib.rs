pub mod error;
pub use error::{FsError, FsErrorKind, FsResult};

pub mod config;

pub mod logging;
pub use logging::Logger;

pub mod fs {
    pub mod path;

    pub mod dir_entry;
    pub use dir_entry::DirEntry;

    pub mod dir_scanner;

    pub mod sort;
    pub use sort::SortMode;
}

pub mod storage;

pub mod operators {
    pub mod progress;
    pub use progress::{CancelPoll, NeverCancel, NoProgress, OpStats, Outcome, Progress, ProgressSink};

    pub mod resource_lock;
    pub use resource_lock::{ResourceGuard, ResourceLock, SuspendInhibitor};

    pub mod copy;

    pub mod delete;

    pub mod move_entry;
}

pub mod model {
    pub mod session;
    pub use session::FileManager;
}

pub use model::FileManager;

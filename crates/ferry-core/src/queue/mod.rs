//! Queue module: status state machine, item records, retry policy, and the
//! in-memory upload queue.

mod driver;
mod memory;
mod record;
mod retry;
mod state;

pub use memory::UploadQueue;
pub(crate) use memory::QueueSettings;
pub use record::{ItemAction, QueueItem, QueueItemView};
pub use retry::{AutoRetryPolicy, RetryDispatch};
pub use state::{StatusKind, UploadStatus};

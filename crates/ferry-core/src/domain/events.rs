//! Queue events pushed to subscribers (list views, progress bars, logs).

use serde::Serialize;

use super::failure::UploadFailure;
use super::ids::{RemoteFileId, UploadId};
use super::progress::Progress;

/// Something changed in the queue.
///
/// Events are a notification channel only; the queue's own state is the
/// source of truth and `UploadQueue::items` gives the full picture at any
/// time. Slow subscribers may miss events (broadcast lag).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued { id: UploadId, name: String },
    Started { id: UploadId, attempt: u32, retry_count: u32 },
    Progress { id: UploadId, progress: Progress },
    Completed { id: UploadId, remote_id: RemoteFileId },
    Failed { id: UploadId, failure: UploadFailure },
    Cancelled { id: UploadId },
    Requeued { id: UploadId, retry_count: u32 },
    RetryScheduled { id: UploadId, delay_ms: u64 },
    Removed { id: UploadId },
    Paused,
    Resumed,
    Cleared { removed: usize },
}

impl QueueEvent {
    /// The item this event is about, if any.
    pub fn upload_id(&self) -> Option<UploadId> {
        match self {
            QueueEvent::Enqueued { id, .. }
            | QueueEvent::Started { id, .. }
            | QueueEvent::Progress { id, .. }
            | QueueEvent::Completed { id, .. }
            | QueueEvent::Failed { id, .. }
            | QueueEvent::Cancelled { id }
            | QueueEvent::Requeued { id, .. }
            | QueueEvent::RetryScheduled { id, .. }
            | QueueEvent::Removed { id } => Some(*id),
            QueueEvent::Paused | QueueEvent::Resumed | QueueEvent::Cleared { .. } => None,
        }
    }
}

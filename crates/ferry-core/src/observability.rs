use serde::{Deserialize, Serialize};

use crate::queue::{QueueItem, StatusKind, UploadStatus};

/// Aggregate counts for a summary bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub uploading: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,

    /// 0..=100; reaches 100 only when every item is completed.
    pub global_progress: u8,

    /// Failed items waiting for an automatic retry (also counted in `failed`).
    pub retry_scheduled: usize,

    pub paused: bool,
}

impl QueueStats {
    /// Count items by status and compute global progress.
    ///
    /// Completed items count 100, uploading items their own progress,
    /// everything else 0; the sum is averaged over all items and rounded.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        let mut stats = QueueStats::default();
        let mut contribution: u64 = 0;

        for item in items {
            stats.total += 1;
            match &item.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Uploading { progress } => {
                    stats.uploading += 1;
                    contribution += u64::from(progress.percent());
                }
                UploadStatus::Completed { .. } => {
                    stats.completed += 1;
                    contribution += 100;
                }
                UploadStatus::Failed { .. } => stats.failed += 1,
                UploadStatus::Cancelled => stats.cancelled += 1,
            }
        }

        stats.global_progress = global_progress(contribution, stats.total, stats.completed);
        stats
    }

    pub fn count(&self, kind: StatusKind) -> usize {
        match kind {
            StatusKind::Pending => self.pending,
            StatusKind::Uploading => self.uploading,
            StatusKind::Completed => self.completed,
            StatusKind::Failed => self.failed,
            StatusKind::Cancelled => self.cancelled,
        }
    }

    /// Nothing in flight and nothing will start on its own: pending items
    /// are held back by a pause, and no automatic retry is scheduled.
    pub fn is_idle(&self) -> bool {
        self.uploading == 0 && self.retry_scheduled == 0 && (self.pending == 0 || self.paused)
    }
}

fn global_progress(contribution: u64, total: usize, completed: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let total = total as u64;
    let rounded = (contribution + total / 2) / total;
    if completed as u64 == total {
        100
    } else {
        // rounding must not report 100 while something is unfinished
        rounded.min(99) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use ulid::Ulid;

    use crate::domain::{
        Destination, FilePayload, Progress, RemoteFileId, UploadFailure, UploadId,
    };

    fn item_with(status: UploadStatus) -> QueueItem {
        let mut item = QueueItem::new(
            UploadId::from_ulid(Ulid::new()),
            Arc::new(FilePayload::from_bytes("f.bin", vec![0u8; 4])),
            Destination::default(),
            Utc::now(),
        );
        item.status = status;
        item
    }

    fn completed() -> UploadStatus {
        UploadStatus::Completed {
            remote_id: RemoteFileId::new("m"),
        }
    }

    #[test]
    fn empty_queue_reports_zero() {
        let stats = QueueStats::from_items(&Vec::<QueueItem>::new());
        assert_eq!(stats, QueueStats::default());
        assert!(stats.is_idle());
    }

    #[test]
    fn paused_pending_items_are_idle() {
        let mut stats = QueueStats::from_items(&vec![item_with(UploadStatus::Pending)]);
        assert!(!stats.is_idle());

        stats.paused = true;
        assert!(stats.is_idle());
        assert_eq!(stats.count(StatusKind::Pending), 1);
    }

    #[test]
    fn counts_by_status() {
        let items = vec![
            item_with(UploadStatus::Pending),
            item_with(UploadStatus::Uploading {
                progress: Progress::new(50),
            }),
            item_with(completed()),
            item_with(UploadStatus::Failed {
                failure: UploadFailure::transport("x"),
            }),
            item_with(UploadStatus::Cancelled),
        ];
        let stats = QueueStats::from_items(&items);

        assert_eq!(stats.pending, 1);
        assert_eq!(stats.uploading, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total, 5);
        // (50 + 100) / 5
        assert_eq!(stats.global_progress, 30);
    }

    #[test]
    fn all_completed_is_hundred() {
        let items = vec![item_with(completed()), item_with(completed())];
        assert_eq!(QueueStats::from_items(&items).global_progress, 100);
    }

    #[test]
    fn rounding_never_reaches_hundred_early() {
        // (100 + 99) / 2 = 99.5 would round to 100
        let items = vec![
            item_with(completed()),
            item_with(UploadStatus::Uploading {
                progress: Progress::new(99),
            }),
        ];
        assert_eq!(QueueStats::from_items(&items).global_progress, 99);
    }
}

//! Queue item: payload + status + bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{StatusKind, UploadStatus};
use crate::domain::{Destination, FilePayload, Progress, RemoteFileId, UploadFailure, UploadId};
use crate::error::QueueError;

/// User-facing actions on a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Retry,
    Cancel,
    Remove,
}

impl std::fmt::Display for ItemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemAction::Retry => f.write_str("retry"),
            ItemAction::Cancel => f.write_str("cancel"),
            ItemAction::Remove => f.write_str("remove"),
        }
    }
}

/// One file's upload lifecycle.
///
/// - Single source of truth for the item's state.
/// - All transitions go through the methods below, which refuse anything the
///   state machine does not allow.
/// - `attempt` is bumped every time a transport call starts; results carry
///   the attempt they belong to so late answers can be told apart.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: UploadId,
    pub file: Arc<FilePayload>,
    pub destination: Destination,
    pub status: UploadStatus,

    /// Times the item re-entered the upload path from `Failed`.
    pub retry_count: u32,

    /// Transport calls started for this item (including the current one).
    pub attempt: u32,

    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(
        id: UploadId,
        file: Arc<FilePayload>,
        destination: Destination,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            file,
            destination,
            status: UploadStatus::Pending,
            retry_count: 0,
            attempt: 0,
            enqueued_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> StatusKind {
        self.status.kind()
    }

    fn invalid(&self, action: &'static str) -> QueueError {
        QueueError::InvalidTransition {
            id: self.id,
            from: self.kind(),
            action,
        }
    }

    /// Pending -> Uploading. Returns the new attempt number.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> Result<u32, QueueError> {
        if self.kind() != StatusKind::Pending {
            return Err(self.invalid("start"));
        }
        self.enter_uploading(now);
        Ok(self.attempt)
    }

    /// Failed -> Uploading (explicit retry that bypasses the serial slot).
    pub fn retry_now(&mut self, now: DateTime<Utc>) -> Result<u32, QueueError> {
        if self.kind() != StatusKind::Failed {
            return Err(self.invalid("retry"));
        }
        self.retry_count += 1;
        self.enter_uploading(now);
        Ok(self.attempt)
    }

    /// Failed -> Pending; the processor re-sends it in order.
    pub fn requeue(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.kind() != StatusKind::Failed {
            return Err(self.invalid("retry"));
        }
        self.retry_count += 1;
        self.status = UploadStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    fn enter_uploading(&mut self, now: DateTime<Utc>) {
        self.attempt += 1;
        self.status = UploadStatus::Uploading {
            progress: Progress::ZERO,
        };
        self.updated_at = now;
    }

    /// Apply a progress report from `attempt`. Returns true if the visible
    /// progress moved. Stale attempts and regressions are ignored.
    pub fn record_progress(&mut self, attempt: u32, progress: Progress, now: DateTime<Utc>) -> bool {
        if attempt != self.attempt {
            return false;
        }
        match &mut self.status {
            UploadStatus::Uploading { progress: current } if progress > *current => {
                *current = progress;
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Uploading -> Completed, if `attempt` is still the live one.
    pub fn complete(&mut self, attempt: u32, remote_id: RemoteFileId, now: DateTime<Utc>) -> bool {
        if !self.is_live_attempt(attempt) {
            return false;
        }
        self.status = UploadStatus::Completed { remote_id };
        self.updated_at = now;
        true
    }

    /// Uploading -> Failed, if `attempt` is still the live one.
    pub fn fail(&mut self, attempt: u32, failure: UploadFailure, now: DateTime<Utc>) -> bool {
        if !self.is_live_attempt(attempt) {
            return false;
        }
        self.status = UploadStatus::Failed { failure };
        self.updated_at = now;
        true
    }

    /// Pending/Uploading -> Cancelled.
    ///
    /// Returns `Ok(false)` for items that are already terminal, and an error
    /// for failed items (those are removed, not cancelled).
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<bool, QueueError> {
        match self.kind() {
            StatusKind::Pending | StatusKind::Uploading => {
                self.status = UploadStatus::Cancelled;
                self.updated_at = now;
                Ok(true)
            }
            StatusKind::Completed | StatusKind::Cancelled => Ok(false),
            StatusKind::Failed => Err(self.invalid("cancel")),
        }
    }

    fn is_live_attempt(&self, attempt: u32) -> bool {
        attempt == self.attempt && self.kind() == StatusKind::Uploading
    }

    /// Buttons a list view should offer for this row.
    pub fn available_actions(&self) -> Vec<ItemAction> {
        match self.kind() {
            StatusKind::Pending | StatusKind::Uploading => vec![ItemAction::Cancel],
            StatusKind::Failed => vec![ItemAction::Retry, ItemAction::Remove],
            StatusKind::Completed | StatusKind::Cancelled => vec![ItemAction::Remove],
        }
    }

    pub fn view(&self) -> QueueItemView {
        QueueItemView {
            id: self.id,
            name: self.file.name.clone(),
            size: self.file.size,
            mime_type: self.file.mime_type.clone(),
            status: self.status.clone(),
            retry_count: self.retry_count,
            actions: self.available_actions(),
            enqueued_at: self.enqueued_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only snapshot of one item, shaped for rendering a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItemView {
    pub id: UploadId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(flatten)]
    pub status: UploadStatus,
    pub retry_count: u32,
    pub actions: Vec<ItemAction>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItemView {
    pub fn kind(&self) -> StatusKind {
        self.status.kind()
    }
}

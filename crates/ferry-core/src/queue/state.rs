//! Upload state machine.

use serde::{Deserialize, Serialize};

use crate::domain::{Progress, RemoteFileId, UploadFailure};

/// Status of one queue item.
///
/// State transitions:
/// - Pending -> Uploading -> Completed
/// - Pending -> Uploading -> Failed -> Uploading (explicit retry)
/// - Pending -> Cancelled
/// - Uploading -> Cancelled
///
/// Data only lives in the variant that owns it: progress while uploading,
/// the failure while failed, the server id once completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    /// Waiting for the processor to pick it.
    Pending,

    /// Transport call in flight.
    Uploading { progress: Progress },

    /// Stored on the server.
    Completed { remote_id: RemoteFileId },

    /// Last attempt failed; can be retried or removed.
    Failed { failure: UploadFailure },

    /// Cancelled by the user (not an error).
    Cancelled,
}

impl UploadStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            UploadStatus::Pending => StatusKind::Pending,
            UploadStatus::Uploading { .. } => StatusKind::Uploading,
            UploadStatus::Completed { .. } => StatusKind::Completed,
            UploadStatus::Failed { .. } => StatusKind::Failed,
            UploadStatus::Cancelled => StatusKind::Cancelled,
        }
    }

    /// Progress of the current attempt; `None` unless uploading.
    pub fn progress(&self) -> Option<Progress> {
        match self {
            UploadStatus::Uploading { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&UploadFailure> {
        match self {
            UploadStatus::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// Flat mirror of `UploadStatus` for counting, logging and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl StatusKind {
    /// No further transitions (only removal).
    pub fn is_terminal(self) -> bool {
        matches!(self, StatusKind::Completed | StatusKind::Cancelled)
    }

    /// Not moving on its own: terminal, or failed and waiting for the user.
    pub fn is_at_rest(self) -> bool {
        self.is_terminal() || self == StatusKind::Failed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Pending => "pending",
            StatusKind::Uploading => "uploading",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
            StatusKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(StatusKind::Pending, false, false)]
    #[case::uploading(StatusKind::Uploading, false, false)]
    #[case::completed(StatusKind::Completed, true, true)]
    #[case::failed(StatusKind::Failed, false, true)]
    #[case::cancelled(StatusKind::Cancelled, true, true)]
    fn terminal_and_at_rest(#[case] kind: StatusKind, #[case] terminal: bool, #[case] at_rest: bool) {
        assert_eq!(kind.is_terminal(), terminal);
        assert_eq!(kind.is_at_rest(), at_rest);
    }

    #[test]
    fn progress_only_while_uploading() {
        let uploading = UploadStatus::Uploading {
            progress: Progress::new(30),
        };
        assert_eq!(uploading.progress(), Some(Progress::new(30)));
        assert_eq!(UploadStatus::Pending.progress(), None);
        assert_eq!(
            UploadStatus::Completed {
                remote_id: RemoteFileId::new("m1")
            }
            .progress(),
            None
        );
    }

    #[test]
    fn status_serializes_flat() {
        let failed = UploadStatus::Failed {
            failure: UploadFailure::transport("timeout"),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure"]["kind"], "transport");
    }
}

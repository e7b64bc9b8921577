use thiserror::Error;

use crate::domain::UploadId;
use crate::queue::StatusKind;

/// Errors returned by queue control operations.
///
/// A refused operation never changes queue state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("upload not found: {0}")]
    NotFound(UploadId),

    #[error("cannot {action} upload {id} while it is {from}")]
    InvalidTransition {
        id: UploadId,
        from: StatusKind,
        action: &'static str,
    },

    #[error("no files to enqueue")]
    EmptyBatch,
}

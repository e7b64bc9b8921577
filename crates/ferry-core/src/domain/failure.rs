//! Item-level upload failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure classification.
///
/// - Transport: network or server error, worth retrying.
/// - Rejected: the server declined the file (duplicate, too large, bad
///   type). Retrying the same bytes will not help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => f.write_str("transport error"),
            FailureKind::Rejected => f.write_str("rejected"),
        }
    }
}

/// Why one upload attempt failed. Stored on the item while it is `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct UploadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl UploadFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Rejected,
            message: message.into(),
        }
    }

    /// Can an automatic retry plausibly succeed?
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transport
    }
}

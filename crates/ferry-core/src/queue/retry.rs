//! Automatic retry policy: decides whether and when a failed upload is
//! re-sent without user action.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::UploadFailure;

/// How an explicit `retry` re-enters the upload path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDispatch {
    /// Start the transport call right away, next to whatever the processor
    /// is already sending.
    #[default]
    Immediate,

    /// Put the item back to `Pending`; the processor re-sends it in order
    /// and at most one item is ever uploading.
    Requeue,
}

/// Exponential backoff for transport failures.
///
/// `max_retries == 0` disables automatic retry (the default): failures wait
/// for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoRetryPolicy {
    pub max_retries: u32,

    /// Delay before the first automatic retry.
    pub base_delay: Duration,

    pub multiplier: f64,
}

impl AutoRetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }

    pub fn new(max_retries: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier,
        }
    }

    /// Delay before the next retry, or `None` if the failure should wait for
    /// the user.
    ///
    /// `retry_count` is the number of retries already made. Rejections are
    /// never retried automatically.
    ///
    /// delay = base_delay * multiplier^retry_count
    pub fn next_delay(&self, retry_count: u32, failure: &UploadFailure) -> Option<Duration> {
        if !failure.is_transient() || retry_count >= self.max_retries {
            return None;
        }
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(retry_count as i32);
        Some(Duration::from_secs_f64(delay_secs))
    }
}

impl Default for AutoRetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

//! Per-upload progress percentage.

use serde::{Deserialize, Serialize};

/// Integer percentage, always within 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const COMPLETE: Progress = Progress(100);

    /// Values above 100 are clamped.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Percentage of `sent` out of `total`, rounded down so that 100 is only
    /// reported once every byte went out. An empty file counts as complete.
    pub fn from_bytes(sent: u64, total: u64) -> Self {
        if total == 0 {
            return Self::COMPLETE;
        }
        let sent = sent.min(total) as u128;
        Self((sent * 100 / total as u128) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_hundred() {
        assert_eq!(Progress::new(250).percent(), 100);
        assert_eq!(Progress::new(42).percent(), 42);
    }

    #[test]
    fn from_bytes_rounds_down() {
        assert_eq!(Progress::from_bytes(0, 10).percent(), 0);
        assert_eq!(Progress::from_bytes(999, 1000).percent(), 99);
        assert_eq!(Progress::from_bytes(1000, 1000), Progress::COMPLETE);
        assert_eq!(Progress::from_bytes(5000, 1000), Progress::COMPLETE);
        assert_eq!(Progress::from_bytes(0, 0), Progress::COMPLETE);
    }

    #[test]
    fn from_bytes_handles_large_files() {
        let total = u64::MAX;
        assert_eq!(Progress::from_bytes(total / 2, total).percent(), 49);
    }
}

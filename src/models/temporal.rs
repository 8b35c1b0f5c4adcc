//! Bitemporal bookkeeping for memory records.
//!
//! | Dimension | Question Answered |
//! |-----------|-------------------|
//! | **Valid time** | When did this become true in the codebase? |
//! | **Transaction time** | When did the system record it? |
//!
//! Transaction time is set once at creation and never modified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When a record was written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTime {
    /// Recording timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl TransactionTime {
    /// Creates a transaction time at the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Creates a transaction time at a specific instant.
    #[must_use]
    pub const fn at(recorded_at: DateTime<Utc>) -> Self {
        Self { recorded_at }
    }
}

/// When a record's content holds in the world.
///
/// Half-open interval `[valid_from, valid_until)`; `valid_until = None` means still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTime {
    /// Start of validity (inclusive).
    pub valid_from: DateTime<Utc>,
    /// End of validity (exclusive), if closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl ValidTime {
    /// Creates an open-ended range starting at `valid_from`.
    #[must_use]
    pub const fn from(valid_from: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_until: None,
        }
    }

    /// Closes the range at `end`.
    #[must_use]
    pub const fn until(mut self, end: DateTime<Utc>) -> Self {
        self.valid_until = Some(end);
        self
    }

    /// Checks if the given instant falls within the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.valid_from && self.valid_until.is_none_or(|end| at < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_valid_time_half_open() {
        let start = Utc::now();
        let end = start + Duration::days(1);
        let range = ValidTime::from(start).until(end);

        assert!(range.contains(start));
        assert!(range.contains(start + Duration::hours(12)));
        assert!(!range.contains(end));
        assert!(!range.contains(start - Duration::seconds(1)));
    }

    #[test]
    fn test_open_range_contains_future() {
        let start = Utc::now();
        let range = ValidTime::from(start);
        assert!(range.contains(start + Duration::days(3650)));
    }
}

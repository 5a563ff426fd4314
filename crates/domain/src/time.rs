//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDate, Utc};

/// UTC timestamp used for entry transitions and event times.
pub type Timestamp = DateTime<Utc>;

/// Calendar day a queue instance represents.
pub type QueueDate = NaiveDate;

/// Return the current UTC time.
///
/// Domain code never calls this; it is the building block for clock
/// adapters at the application edge.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole minutes elapsed between `since` and `until`, clamped at zero.
#[must_use]
pub fn minutes_between(since: Timestamp, until: Timestamp) -> i64 {
    (until - since).num_minutes().max(0)
}

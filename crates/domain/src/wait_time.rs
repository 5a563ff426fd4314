//! Wait-time estimation — pure functions over a queue's entries.
//!
//! Nothing here touches a live [`Queue`](crate::queue::Queue); the aggregate
//! delegates to these functions and tests call them directly.

use serde::{Deserialize, Serialize};

use crate::entry::QueueEntry;
use crate::id::QueueEntryId;

/// Derived, point-in-time view of where a waiting customer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitEstimate {
    /// 1-based rank among waiting entries, or 0 when not waiting.
    pub position: u32,
    /// Waiting customers strictly ahead.
    pub customers_ahead: u32,
    /// Estimated minutes until being called, rounded up.
    pub minutes: u32,
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Rank of `entry_id` among waiting entries ordered by stored position.
///
/// Returns `None` when the entry is unknown and `Some(0)` when it exists but is
/// not `Waiting` (already called, served, or removed). A called customer is
/// therefore reported as position 0 even though service has not started.
#[must_use]
pub fn rank(entries: &[QueueEntry], entry_id: QueueEntryId) -> Option<u32> {
    let target = entries.iter().find(|entry| entry.id == entry_id)?;
    if !target.is_waiting() {
        return Some(0);
    }
    let ahead = entries
        .iter()
        .filter(|entry| entry.is_waiting() && entry.position < target.position)
        .count();
    Some(saturating_u32(ahead).saturating_add(1))
}

/// `ceil(customers_ahead * avg_service_minutes / max(1, active_staff_count))`.
#[must_use]
pub fn estimate_minutes(
    customers_ahead: u32,
    avg_service_minutes: u32,
    active_staff_count: u32,
) -> u32 {
    let staff = u64::from(active_staff_count.max(1));
    let total = u64::from(customers_ahead) * u64::from(avg_service_minutes);
    u32::try_from(total.div_ceil(staff)).unwrap_or(u32::MAX)
}

/// Full estimate for one entry; `None` when the entry is unknown.
#[must_use]
pub fn estimate(
    entries: &[QueueEntry],
    entry_id: QueueEntryId,
    avg_service_minutes: u32,
    active_staff_count: u32,
) -> Option<WaitEstimate> {
    let position = rank(entries, entry_id)?;
    let customers_ahead = position.saturating_sub(1);
    let minutes = if position == 0 {
        0
    } else {
        estimate_minutes(customers_ahead, avg_service_minutes, active_staff_count)
    };
    Some(WaitEstimate {
        position,
        customers_ahead,
        minutes,
    })
}

/// Historical average service duration of completed entries, rounded up.
#[must_use]
pub fn average_service_minutes(entries: &[QueueEntry]) -> Option<u32> {
    let durations: Vec<u64> = entries
        .iter()
        .filter_map(|entry| entry.service_duration_minutes)
        .map(u64::from)
        .collect();
    if durations.is_empty() {
        return None;
    }
    let count = u64::try_from(durations.len()).unwrap_or(u64::MAX);
    let sum: u64 = durations.iter().sum();
    Some(u32::try_from(sum.div_ceil(count)).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryStatus, NewEntry};
    use crate::id::QueueId;
    use chrono::{TimeZone, Utc};

    fn entries(statuses: &[EntryStatus]) -> Vec<QueueEntry> {
        let queue_id = QueueId::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap();
        statuses
            .iter()
            .zip(1_u32..)
            .map(|(status, position)| {
                let mut entry = QueueEntry::waiting(
                    queue_id,
                    position,
                    NewEntry::new(format!("cust-{position}"), "Customer"),
                    at,
                );
                entry.status = *status;
                entry
            })
            .collect()
    }

    #[test]
    fn should_round_up_partial_minutes() {
        assert_eq!(estimate_minutes(1, 20, 1), 20);
        assert_eq!(estimate_minutes(2, 30, 2), 30);
        assert_eq!(estimate_minutes(1, 25, 2), 13);
        assert_eq!(estimate_minutes(3, 10, 4), 8);
    }

    #[test]
    fn should_treat_zero_staff_as_one() {
        assert_eq!(estimate_minutes(2, 15, 0), 30);
    }

    #[test]
    fn should_return_zero_when_nobody_ahead() {
        assert_eq!(estimate_minutes(0, 45, 3), 0);
    }

    #[test]
    fn should_rank_only_among_waiting_entries() {
        use EntryStatus::{Called, Cancelled, Waiting};
        let list = entries(&[Called, Cancelled, Waiting, Waiting]);

        assert_eq!(rank(&list, list[2].id), Some(1));
        assert_eq!(rank(&list, list[3].id), Some(2));
    }

    #[test]
    fn should_rank_zero_when_entry_not_waiting() {
        use EntryStatus::{Called, Waiting};
        let list = entries(&[Called, Waiting]);
        assert_eq!(rank(&list, list[0].id), Some(0));
    }

    #[test]
    fn should_return_none_for_unknown_entry() {
        let list = entries(&[EntryStatus::Waiting]);
        assert_eq!(rank(&list, QueueEntryId::new()), None);
    }

    #[test]
    fn should_estimate_from_customers_ahead() {
        use EntryStatus::Waiting;
        let list = entries(&[Waiting, Waiting, Waiting]);

        let third = estimate(&list, list[2].id, 30, 2).unwrap();
        assert_eq!(third.position, 3);
        assert_eq!(third.customers_ahead, 2);
        assert_eq!(third.minutes, 30);

        let first = estimate(&list, list[0].id, 30, 2).unwrap();
        assert_eq!(first.minutes, 0);
    }

    #[test]
    fn should_report_zero_wait_for_called_entry() {
        use EntryStatus::{Called, Waiting};
        let list = entries(&[Waiting, Called]);
        let est = estimate(&list, list[1].id, 20, 1).unwrap();
        assert_eq!(est.position, 0);
        assert_eq!(est.minutes, 0);
    }

    #[test]
    fn should_average_completed_durations_rounding_up() {
        let mut list = entries(&[EntryStatus::Completed, EntryStatus::Completed]);
        list[0].service_duration_minutes = Some(20);
        list[1].service_duration_minutes = Some(25);
        assert_eq!(average_service_minutes(&list), Some(23));
    }

    #[test]
    fn should_have_no_average_without_completed_entries() {
        let list = entries(&[EntryStatus::Waiting]);
        assert_eq!(average_service_minutes(&list), None);
    }
}

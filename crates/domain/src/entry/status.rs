//! Entry status — where a ticket sits in its lifecycle.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`QueueEntry`](super::QueueEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Waiting,
    Called,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl EntryStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Waiting,
        Self::Called,
        Self::CheckedIn,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
    ];

    /// Whether the entry counts against the queue's capacity.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Waiting | Self::Called)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::CheckedIn => "checked_in",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entry status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EntryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_waiting() {
        assert_eq!(EntryStatus::default(), EntryStatus::Waiting);
    }

    #[test]
    fn should_count_waiting_and_called_as_active() {
        let active: Vec<_> = EntryStatus::ALL
            .into_iter()
            .filter(|s| s.is_active())
            .collect();
        assert_eq!(active, vec![EntryStatus::Waiting, EntryStatus::Called]);
    }

    #[test]
    fn should_flag_completed_cancelled_and_no_show_as_terminal() {
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Cancelled.is_terminal());
        assert!(EntryStatus::NoShow.is_terminal());
        assert!(!EntryStatus::CheckedIn.is_terminal());
    }

    #[test]
    fn should_parse_every_displayed_status() {
        for status in EntryStatus::ALL {
            assert_eq!(status.to_string().parse::<EntryStatus>().unwrap(), status);
        }
    }

    #[test]
    fn should_reject_unknown_status_string() {
        assert!("served".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn should_serialize_as_snake_case() {
        let json = serde_json::to_string(&EntryStatus::NoShow).unwrap();
        assert_eq!(json, "\"no_show\"");
    }
}

//! Event counters.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One record from the event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Participant that produced the event.
    #[serde(alias = "participantId", alias = "userId")]
    pub participant_id: String,

    /// When the event happened, if the source knows.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates an event without a timestamp.
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            timestamp: None,
        }
    }
}

/// Counters for one day of events.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    counts: BTreeMap<String, u32>,
    total: u64,
}

impl Tally {
    /// Counts an event and returns how many times the participant has been seen.
    pub fn record(&mut self, participant_id: &str) -> u32 {
        let seen = self.counts.entry(participant_id.to_string()).or_insert(0);
        *seen = seen.saturating_add(1);
        self.total = self.total.saturating_add(1);
        *seen
    }

    /// Returns how many times the participant has been seen.
    pub fn count(&self, participant_id: &str) -> u32 {
        self.counts.get(participant_id).copied().unwrap_or(0)
    }

    /// Total events.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Distinct participants.
    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    /// Replaces the counters with empty ones and returns the closed day.
    pub fn take(&mut self, day: NaiveDate, at: DateTime<Local>) -> DailyLog {
        let closed = std::mem::take(self);
        DailyLog {
            day,
            date: at,
            total_users: closed.unique(),
            total_posts: closed.total,
            user_counts: closed.counts,
        }
    }
}

/// Snapshot written when a day is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    /// Day the counters cover.
    #[serde(skip)]
    pub day: NaiveDate,

    /// When the day was closed.
    pub date: DateTime<Local>,

    pub total_users: usize,
    pub total_posts: u64,
    pub user_counts: BTreeMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_per_participant() {
        let mut tally = Tally::default();
        assert_eq!(tally.record("U1"), 1);
        assert_eq!(tally.record("U2"), 1);
        assert_eq!(tally.record("U1"), 2);
        assert_eq!(tally.count("U1"), 2);
        assert_eq!(tally.count("nobody"), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.unique(), 2);
    }

    #[test]
    fn test_take_resets() {
        let mut tally = Tally::default();
        tally.record("U1");
        tally.record("U1");
        tally.record("U9");

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let log = tally.take(day, Local::now());
        assert_eq!(log.day, day);
        assert_eq!(log.total_users, 2);
        assert_eq!(log.total_posts, 3);
        assert_eq!(log.user_counts.get("U1"), Some(&2));

        assert_eq!(tally.total(), 0);
        assert_eq!(tally.unique(), 0);
    }

    #[test]
    fn test_log_json_field_names() {
        let mut tally = Tally::default();
        tally.record("abc");
        let log = tally.take(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), Local::now());
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["totalUsers"], 1);
        assert_eq!(json["totalPosts"], 1);
        assert_eq!(json["userCounts"]["abc"], 1);
        assert!(json.get("day").is_none());
    }

    #[test]
    fn test_event_accepts_feed_field_names() {
        let event: Event = serde_json::from_str(r#"{"participant_id": "U1"}"#).unwrap();
        assert_eq!(event.participant_id, "U1");
        assert!(event.timestamp.is_none());

        let event: Event = serde_json::from_str(
            r#"{"userId": "U2", "timestamp": "2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.participant_id, "U2");
        assert!(event.timestamp.is_some());
    }
}

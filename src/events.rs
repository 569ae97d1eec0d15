//! Bounded in-memory activity log of controller events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

// ---

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

pub struct EventLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl EventLog {
    // ---
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub async fn record(&self, kind: EventKind, action: &str, details: impl Into<String>) {
        // ---
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.to_string(),
            details: details.into(),
            kind,
        };

        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_recent_is_newest_first_and_bounded() {
        // ---
        let log = EventLog::new(3);
        for i in 0..5 {
            log.record(EventKind::Info, "tick", format!("n={i}")).await;
        }

        let recent = log.recent(10).await;
        let details: Vec<_> = recent.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(details, vec!["n=4", "n=3", "n=2"]);
        assert_eq!(log.recent(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_serializes_kind_as_type() {
        // ---
        let log = EventLog::default();
        log.record(EventKind::Warning, "relay", "send failed").await;

        let value = serde_json::to_value(&log.recent(1).await[0]).unwrap();
        assert_eq!(value["type"], "warning");
        assert_eq!(value["action"], "relay");
    }
}

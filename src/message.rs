//! Message ledger value types.

use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unit of work travelling from one producer to exactly one consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub created_at: Instant,
}

impl Message {
    /// Create a message with a fresh v4 UUID and the current monotonic time
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Instant::now(),
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Instant::now(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

/// Start/end timestamps for one message, owned by the metrics store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRecord {
    pub start: Instant,
    pub end: Option<Instant>,
}

impl LatencyRecord {
    pub fn started_at(start: Instant) -> Self {
        Self { start, end: None }
    }

    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// Time between start and end, `None` until the message is processed.
    /// Saturates to zero if `end` precedes `start`.
    pub fn latency(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_duration_since(self.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_message_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| Message::new().id).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_latency_record_completion() {
        let start = Instant::now();
        let mut record = LatencyRecord::started_at(start);
        assert!(!record.is_complete());
        assert_eq!(record.latency(), None);

        record.end = Some(start + Duration::from_millis(40));
        assert!(record.is_complete());
        assert_eq!(record.latency(), Some(Duration::from_millis(40)));
    }
}

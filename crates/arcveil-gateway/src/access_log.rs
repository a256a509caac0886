//! Bounded in-memory request log
//!
//! Every response is recorded after it is produced; the ring drops the
//! oldest entry once capacity is reached.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One logged request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEntry {
    /// Unix seconds at response time
    pub timestamp: i64,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Client IP (from `x-forwarded-for` when present)
    pub ip: String,
    /// Response status code
    pub status: u16,
    /// Authenticated username, when the request carried a valid token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Fixed-capacity ring of access entries.
#[derive(Debug)]
pub struct AccessLog {
    capacity: usize,
    entries: Mutex<VecDeque<AccessEntry>>,
}

impl AccessLog {
    /// Create a log that retains at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Append one entry, evicting the oldest when full. A zero-capacity
    /// log records nothing.
    pub fn record(&self, entry: AccessEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `n` entries, newest last.
    pub fn recent(&self, n: usize) -> Vec<AccessEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .skip(entries.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, status: u16) -> AccessEntry {
        AccessEntry {
            timestamp: 1_705_320_000,
            method: "POST".to_string(),
            path: path.to_string(),
            ip: "10.0.0.1".to_string(),
            status,
            username: None,
        }
    }

    #[test]
    fn record_and_recent() {
        let log = AccessLog::new(10);
        assert!(log.is_empty());
        log.record(entry("/api/query", 200));
        log.record(entry("/api/privacy", 400));
        assert_eq!(log.len(), 2);

        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].path, "/api/privacy");
        assert_eq!(recent[0].status, 400);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let log = AccessLog::new(3);
        for i in 0..5 {
            log.record(entry(&format!("/r{i}"), 200));
        }
        assert_eq!(log.len(), 3);
        let recent = log.recent(10);
        assert_eq!(recent[0].path, "/r2");
        assert_eq!(recent[2].path, "/r4");
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let log = AccessLog::new(0);
        log.record(entry("/health", 200));
        log.record(entry("/api/query", 200));
        assert!(log.is_empty());
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn username_omitted_from_serialized_anonymous_entries() {
        let json = serde_json::to_value(entry("/health", 200)).unwrap();
        assert!(json.get("username").is_none());
    }
}

//! Bounded log of user-facing gateway events.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{LogEntry, LogLevel};

pub const LOG_CAPACITY: usize = 100;

/// Ring buffer of [`LogEntry`]; the oldest entry is dropped once full.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry and mirror it to tracing.
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => info!(target: "market_sentinel::activity", "{}", message),
            LogLevel::Warn => warn!(target: "market_sentinel::activity", "{}", message),
            LogLevel::Error => error!(target: "market_sentinel::activity", "{}", message),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Success, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_one_hundred() {
        assert_eq!(ActivityLog::new().capacity(), 100);
    }

    #[test]
    fn appending_past_capacity_drops_oldest() {
        let mut log = ActivityLog::new();
        for i in 0..=LOG_CAPACITY {
            log.info(format!("event {}", i));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let first = log.entries().next().unwrap();
        assert_eq!(first.message, "event 1");
        let last = log.entries().last().unwrap();
        assert_eq!(last.message, format!("event {}", LOG_CAPACITY));
    }

    #[test]
    fn push_records_level() {
        let mut log = ActivityLog::with_capacity(3);
        log.success("connected");
        log.warn("slow");
        log.error("down");
        let levels: Vec<_> = log.entries().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Success, LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn tail_returns_most_recent() {
        let mut log = ActivityLog::with_capacity(10);
        for i in 0..5 {
            log.info(i.to_string());
        }
        let tail: Vec<_> = log.tail(2).map(|e| e.message.as_str()).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(log.tail(50).count(), 5);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut log = ActivityLog::with_capacity(0);
        log.info("a");
        log.info("b");
        assert_eq!(log.len(), 1);
    }
}

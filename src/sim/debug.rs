//! Per-severity message log.
//!
//! Every problem the simulator detects while running ends up here instead of
//! unwinding out of a clock tick. Each [`Level`] has its own append-only
//! buffer. Entries are mirrored to the `log` facade so an embedding
//! application can route them to its own logger.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use serde::{Serialize, Deserialize};
use crate::sim::SimError;

/// Message severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Log,
    Info,
    Warn,
    Error,
    Crit,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::Log, Level::Info, Level::Warn, Level::Error, Level::Crit];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Log => "LOG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Crit => "CRIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct LogBook {
    buffers: [Vec<String>; 5],
}

/// Shared handle to one simulation's message log.
///
/// Clones refer to the same buffers.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    book: Rc<RefCell<LogBook>>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at `level`.
    pub fn push(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Log => log::debug!(target: "vonsim::debug", "{}", message),
            Level::Info => log::info!(target: "vonsim::debug", "{}", message),
            Level::Warn => log::warn!(target: "vonsim::debug", "{}", message),
            Level::Error | Level::Crit => {
                log::error!(target: "vonsim::debug", "[{}] {}", level, message)
            }
        }
        self.book.borrow_mut().buffers[level.index()].push(message);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.push(Level::Log, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    pub fn crit(&self, message: impl Into<String>) {
        self.push(Level::Crit, message);
    }

    /// Record an error at its own severity.
    pub fn report(&self, error: &SimError) {
        self.push(error.severity(), error.to_string());
    }

    /// Copy of every message recorded at `level`, oldest first.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.book.borrow().buffers[level.index()].clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.book.borrow().buffers[level.index()].len()
    }

    /// Number of messages at `level` or above.
    pub fn count_at_least(&self, level: Level) -> usize {
        Level::ALL.iter().filter(|l| **l >= level).map(|l| self.count(*l)).sum()
    }

    pub fn clear(&self) {
        for buffer in self.book.borrow_mut().buffers.iter_mut() {
            buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_independent() {
        let log = DebugLog::new();
        log.warn("first warning");
        log.crit("overflow");
        log.warn("second warning");

        assert_eq!(log.messages(Level::Warn), vec!["first warning", "second warning"]);
        assert_eq!(log.messages(Level::Crit), vec!["overflow"]);
        assert!(log.messages(Level::Info).is_empty());
        assert_eq!(log.count_at_least(Level::Warn), 3);
        assert_eq!(log.count_at_least(Level::Error), 1);
    }

    #[test]
    fn test_clones_share_buffers() {
        let log = DebugLog::new();
        let other = log.clone();
        other.info("hello");
        assert_eq!(log.count(Level::Info), 1);
        log.clear();
        assert_eq!(other.count(Level::Info), 0);
    }

    #[test]
    fn test_report_uses_severity() {
        let log = DebugLog::new();
        log.report(&SimError::UnknownSignal("XYZ".into()));
        assert_eq!(log.count(Level::Warn), 1);
        assert!(log.messages(Level::Warn)[0].contains("XYZ"));
    }
}

//! Fire-and-forget notifications for the operator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::clock::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
            Self::Info => write!(f, "Info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Subsystem that raised it, e.g. `"Designer"` or `"Statistics"`.
    pub source: String,
    /// Operation that failed, e.g. `"navigateTo"`.
    pub operation: String,
    pub message: String,
    pub at: Millis,
}

impl Notification {
    /// An error raised by `source` while running `operation`, stamped `at`.
    pub fn error(
        source: &str,
        operation: &str,
        error: impl std::fmt::Display,
        at: Millis,
    ) -> Self {
        Self {
            kind: NotificationKind::Error,
            source: source.to_string(),
            operation: operation.to_string(),
            message: error.to_string(),
            at,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} / {}: {}",
            self.kind, self.source, self.operation, self.message
        )
    }
}

/// Receives notifications. Must not panic or block.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

/// Forwards every notification to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Error => log::error!("{n}"),
            NotificationKind::Warning => log::warn!("{n}"),
            NotificationKind::Info => log::info!("{n}"),
        }
    }
}

/// Keeps the most recent notifications in memory.
#[derive(Debug)]
pub struct NotificationLog {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
    total: Mutex<u64>,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            total: Mutex::new(0),
        }
    }

    /// Newest last.
    pub fn recent(&self) -> Vec<Notification> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.iter().cloned().collect()
    }

    /// Number of notifications ever received, including evicted ones.
    pub fn total(&self) -> u64 {
        match self.total.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NotificationSink for NotificationLog {
    fn notify(&self, notification: Notification) {
        log::debug!("{notification}");
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_back(notification);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        drop(entries);
        match self.total.lock() {
            Ok(mut guard) => *guard += 1,
            Err(poisoned) => *poisoned.into_inner() += 1,
        }
    }
}

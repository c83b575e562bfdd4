//! Operational log
//!
//! Human-readable, append-only record of what the pipeline did. Every line is
//! also emitted as a tracing event so the two never drift apart.

use std::sync::{Arc, Mutex, PoisonError};

/// Shared, cloneable operational log
#[derive(Debug, Clone, Default)]
pub struct OperationalLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OperationalLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a milestone
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "company_unify::oplog", "{}", message);
        self.push(message);
    }

    /// Record a degraded path (swallowed error, fallback taken)
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "company_unify::oplog", "{}", message);
        self.push(message);
    }

    /// Snapshot of all lines recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

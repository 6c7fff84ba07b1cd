//! In-memory request log.

use crate::error::{LogError, LogResult};
use crate::ports::outbound::RequestLog;
use parking_lot::RwLock;
use shared_types::{LogId, RequestEnvelope};
use std::sync::atomic::{AtomicU32, Ordering};

/// Request log held in memory.
///
/// Used by tests and single-process clusters. `fail_next_appends` makes the
/// next N appends fail, which is how the log-failure paths are exercised.
#[derive(Default)]
pub struct InMemoryRequestLog {
    entries: RwLock<Vec<RequestEnvelope>>,
    failures_left: AtomicU32,
}

impl InMemoryRequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail with `LogError::Injected`.
    pub fn fail_next_appends(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Every logged envelope.
    pub fn entries(&self) -> Vec<RequestEnvelope> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RequestLog for InMemoryRequestLog {
    fn open(&self) -> LogResult<()> {
        Ok(())
    }

    fn append(&self, envelope: &RequestEnvelope) -> LogResult<LogId> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(LogError::Injected);
        }

        let mut entries = self.entries.write();
        let last = entries.last().map(|e| e.inc_id);
        if envelope.inc_id != LogId::after(last) {
            return Err(LogError::OutOfOrder {
                last,
                got: envelope.inc_id,
            });
        }
        entries.push(envelope.clone());
        Ok(envelope.inc_id)
    }

    fn read_from(&self, from: LogId) -> LogResult<Vec<RequestEnvelope>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.inc_id >= from)
            .cloned()
            .collect())
    }

    fn last_log_id(&self) -> Option<LogId> {
        self.entries.read().last().map(|e| e.inc_id)
    }
}

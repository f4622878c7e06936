//! Dead-letter queue (§4.5 step 7): orders the submission pipeline could
//! not place are parked here instead of silently dropped, with list/
//! retry-one/retry-all operations.

use parking_lot::RwLock;
use uuid::Uuid;

use common::Ts;

use crate::error::{ExecutionError, ExecutionResult};

/// One parked order.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    /// The order that failed to submit.
    pub order_id: Uuid,
    /// Why it ended up here.
    pub reason: String,
    /// When it was parked.
    pub failed_at: Ts,
    /// How many times it has already been retried from this queue.
    pub retry_count: u32,
}

/// Parked failed submissions, newest-pushed last.
#[derive(Default)]
pub struct DeadLetterQueue {
    entries: RwLock<Vec<DeadLetterEntry>>,
}

impl DeadLetterQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a failed order.
    pub fn push(&self, order_id: Uuid, reason: impl Into<String>) {
        self.entries.write().push(DeadLetterEntry {
            order_id,
            reason: reason.into(),
            failed_at: Ts::now(),
            retry_count: 0,
        });
    }

    /// All parked entries, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<DeadLetterEntry> {
        self.entries.read().clone()
    }

    /// Remove and return the entry for `order_id` with its retry count
    /// incremented, for the caller to resubmit through the pipeline.
    pub fn retry_one(&self, order_id: Uuid) -> ExecutionResult<DeadLetterEntry> {
        let mut entries = self.entries.write();
        let idx = entries
            .iter()
            .position(|e| e.order_id == order_id)
            .ok_or(ExecutionError::DeadLetterNotFound { order_id })?;
        let mut entry = entries.remove(idx);
        entry.retry_count += 1;
        Ok(entry)
    }

    /// Remove and return every parked entry, each with its retry count
    /// incremented, for the caller to resubmit.
    pub fn retry_all(&self) -> Vec<DeadLetterEntry> {
        let mut entries = self.entries.write();
        std::mem::take(&mut *entries)
            .into_iter()
            .map(|mut e| {
                e.retry_count += 1;
                e
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_list_round_trips() {
        let dlq = DeadLetterQueue::new();
        let id = Uuid::new_v4();
        dlq.push(id, "adapter down");
        let entries = dlq.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order_id, id);
        assert_eq!(entries[0].retry_count, 0);
    }

    #[test]
    fn retry_one_removes_and_increments() {
        let dlq = DeadLetterQueue::new();
        let id = Uuid::new_v4();
        dlq.push(id, "x");
        let entry = dlq.retry_one(id).unwrap();
        assert_eq!(entry.retry_count, 1);
        assert!(dlq.list().is_empty());
    }

    #[test]
    fn retry_one_missing_entry_errors() {
        let dlq = DeadLetterQueue::new();
        assert!(dlq.retry_one(Uuid::new_v4()).is_err());
    }

    #[test]
    fn retry_all_drains_the_queue() {
        let dlq = DeadLetterQueue::new();
        dlq.push(Uuid::new_v4(), "a");
        dlq.push(Uuid::new_v4(), "b");
        let entries = dlq.retry_all();
        assert_eq!(entries.len(), 2);
        assert!(dlq.list().is_empty());
    }
}

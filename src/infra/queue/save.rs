//! Double-ended stage queue used for LoadReady and Save.

use crate::core::record::RecordId;
use crate::infra::queue::ticket::TicketDeque;

/// FIFO within a tier; urgent records are pushed to the front.
#[derive(Debug, Default, Clone)]
pub struct PriorityDeque {
    inner: TicketDeque,
}

/// Queue of records in the Save stage.
pub type SaveQueue = PriorityDeque;
/// Queue of records in the LoadReady stage.
pub type LoadReadyQueue = PriorityDeque;

impl PriorityDeque {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert by urgency.
    pub fn push(&mut self, id: RecordId, urgent: bool) {
        if urgent {
            self.inner.push_front(id);
        } else {
            self.inner.push_back(id);
        }
    }

    /// Re-insert a record that was popped but could not finish this tick.
    pub fn push_back(&mut self, id: RecordId) {
        self.inner.push_back(id);
    }

    /// Next record.
    pub fn pop_front(&mut self) -> Option<RecordId> {
        self.inner.pop_front()
    }

    /// Forget `id`. Returns false if it was not queued.
    pub fn remove(&mut self, id: RecordId) -> bool {
        self.inner.remove(id)
    }

    /// Membership check.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.inner.contains(id)
    }

    /// Queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Queued records in order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.inner.iter()
    }
}

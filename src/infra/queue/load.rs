//! LoadPrepare queue: records with a preload under way, then records waiting
//! to start one.

use crate::core::record::RecordId;
use crate::infra::queue::ticket::TicketDeque;

/// Two ordered sub-queues; `preloading` is always drained before `entry`.
#[derive(Debug, Default, Clone)]
pub struct LoadQueue {
    preloading: TicketDeque,
    entry: TicketDeque,
}

impl LoadQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Urgent records go to the front of `preloading`, others to the back of `entry`.
    pub fn push(&mut self, id: RecordId, urgent: bool) {
        assert!(!self.contains(id), "record {id} is already in the load queue");
        if urgent {
            self.preloading.push_front(id);
        } else {
            self.entry.push_back(id);
        }
    }

    /// Next record, preloading first.
    pub fn pop_front(&mut self) -> Option<RecordId> {
        self.preloading.pop_front().or_else(|| self.entry.pop_front())
    }

    /// Next record waiting to start its preload.
    pub fn pop_entry(&mut self) -> Option<RecordId> {
        self.entry.pop_front()
    }

    /// Track a record whose preload has started.
    pub fn push_preloading(&mut self, id: RecordId) {
        assert!(!self.contains(id), "record {id} is already in the load queue");
        self.preloading.push_back(id);
    }

    /// Snapshot of the preloading sub-queue in order.
    #[must_use]
    pub fn preloading(&self) -> Vec<RecordId> {
        self.preloading.iter().collect()
    }

    /// Forget `id`. Returns false if it was not queued.
    pub fn remove(&mut self, id: RecordId) -> bool {
        self.preloading.remove(id) || self.entry.remove(id)
    }

    /// Membership in either sub-queue.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.preloading.contains(id) || self.entry.contains(id)
    }

    /// Records waiting to start a preload.
    #[must_use]
    pub fn entry_len(&self) -> usize {
        self.entry.len()
    }

    /// All queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.preloading.len() + self.entry.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every queued record, preloading first.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.preloading.iter().chain(self.entry.iter())
    }
}

//! Double-ended record queue with amortized O(1) removal by identity.

use std::collections::{HashMap, VecDeque};

use crate::core::record::RecordId;

/// FIFO of record ids. Removal only forgets the id's ticket; the stale slot is
/// skipped when it reaches the front, and compacted once stale slots dominate.
#[derive(Debug, Default, Clone)]
pub struct TicketDeque {
    slots: VecDeque<(RecordId, u64)>,
    live: HashMap<RecordId, u64>,
    next_ticket: u64,
}

impl TicketDeque {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, id: RecordId) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let previous = self.live.insert(id, ticket);
        assert!(previous.is_none(), "record {id} is already queued");
        ticket
    }

    /// Append `id`. Panics if it is already queued.
    pub fn push_back(&mut self, id: RecordId) {
        let ticket = self.issue(id);
        self.slots.push_back((id, ticket));
    }

    /// Prepend `id`. Panics if it is already queued.
    pub fn push_front(&mut self, id: RecordId) {
        let ticket = self.issue(id);
        self.slots.push_front((id, ticket));
    }

    fn is_live(&self, slot: (RecordId, u64)) -> bool {
        self.live.get(&slot.0) == Some(&slot.1)
    }

    fn drop_stale_front(&mut self) {
        while let Some(&slot) = self.slots.front() {
            if self.is_live(slot) {
                return;
            }
            self.slots.pop_front();
        }
    }

    /// Remove and return the front id.
    pub fn pop_front(&mut self) -> Option<RecordId> {
        self.drop_stale_front();
        let (id, _) = self.slots.pop_front()?;
        self.live.remove(&id);
        Some(id)
    }

    /// Front id, without removing it.
    pub fn front(&mut self) -> Option<RecordId> {
        self.drop_stale_front();
        self.slots.front().map(|(id, _)| *id)
    }

    /// Forget `id`. Returns false if it was not queued.
    pub fn remove(&mut self, id: RecordId) -> bool {
        if self.live.remove(&id).is_none() {
            return false;
        }
        if self.slots.len() > 32 && self.slots.len() > 2 * self.live.len() {
            let live = &self.live;
            self.slots.retain(|(id, ticket)| live.get(id) == Some(ticket));
        }
        true
    }

    /// Membership check.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.live.contains_key(&id)
    }

    /// Queued ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Queued ids in queue order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.slots
            .iter()
            .filter(|slot| self.is_live(**slot))
            .map(|(id, _)| *id)
    }
}

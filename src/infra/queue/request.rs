//! Request-stage queue: unclustered records plus urgent and normal ready tiers.

use indexmap::IndexSet;

use crate::core::record::RecordId;

/// Records in the Request stage. Ready tiers have set semantics; order within
/// a tier is not part of the contract.
#[derive(Debug, Default, Clone)]
pub struct RequestQueue {
    unclustered: IndexSet<RecordId>,
    urgent: IndexSet<RecordId>,
    normal: IndexSet<RecordId>,
}

impl RequestQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, straight into a ready tier when every requested
    /// platform is already explored.
    pub fn add_request(&mut self, id: RecordId, explored: bool, urgent: bool) {
        assert!(!self.contains(id), "record {id} is already in the request queue");
        if explored {
            self.ready_tier(urgent).insert(id);
        } else {
            self.unclustered.insert(id);
        }
    }

    /// Move an unclustered record into a ready tier.
    pub fn mark_explored(&mut self, id: RecordId, urgent: bool) {
        assert!(
            self.unclustered.swap_remove(&id),
            "record {id} is not waiting for clustering"
        );
        self.ready_tier(urgent).insert(id);
    }

    fn ready_tier(&mut self, urgent: bool) -> &mut IndexSet<RecordId> {
        if urgent {
            &mut self.urgent
        } else {
            &mut self.normal
        }
    }

    /// Next ready record, urgent tier first.
    pub fn pop_ready(&mut self) -> Option<RecordId> {
        self.urgent.pop().or_else(|| self.normal.pop())
    }

    /// Up to `max` unclustered records. They stay queued.
    #[must_use]
    pub fn unclustered_batch(&self, max: usize) -> Vec<RecordId> {
        self.unclustered.iter().take(max).copied().collect()
    }

    /// Forget `id` wherever it is. Returns false if it was not queued.
    pub fn remove(&mut self, id: RecordId) -> bool {
        self.unclustered.swap_remove(&id) || self.urgent.swap_remove(&id) || self.normal.swap_remove(&id)
    }

    /// Membership in any subset.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.unclustered.contains(&id) || self.urgent.contains(&id) || self.normal.contains(&id)
    }

    /// Whether `id` is waiting for clustering.
    #[must_use]
    pub fn is_unclustered(&self, id: RecordId) -> bool {
        self.unclustered.contains(&id)
    }

    /// Records waiting for clustering.
    #[must_use]
    pub fn unclustered_len(&self) -> usize {
        self.unclustered.len()
    }

    /// Records in either ready tier.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.urgent.len() + self.normal.len()
    }

    /// All queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.unclustered.len() + self.ready_len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every queued record, unclustered first.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.unclustered
            .iter()
            .chain(&self.urgent)
            .chain(&self.normal)
            .copied()
    }
}

//! Aggregate pipeline counters, updated incrementally by record transitions.

use serde::Serialize;

use crate::core::state::PackageState;

/// O(1) aggregate counters over all records.
#[derive(Debug, Clone, Default)]
pub struct Monitor {
    in_progress: usize,
    preload_allocated: usize,
    cooked: usize,
    urgent_by_state: [usize; PackageState::COUNT],
}

/// Serializable view of the monitor, for status logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    /// Records between Request and Save.
    pub in_progress: usize,
    /// Records holding a preload slot.
    pub preload_allocated: usize,
    /// Records with at least one attempted platform.
    pub cooked: usize,
    /// Urgent records per state, indexed by [`PackageState::index`].
    pub urgent_by_state: [usize; PackageState::COUNT],
}

fn decrement(counter: &mut usize, what: &str) {
    assert!(*counter > 0, "monitor {what} counter would go negative");
    *counter -= 1;
}

impl Monitor {
    /// Create a monitor with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A record entered or left the in-progress states.
    pub fn on_in_progress_changed(&mut self, in_progress: bool) {
        if in_progress {
            self.in_progress += 1;
        } else {
            decrement(&mut self.in_progress, "in-progress");
        }
    }

    /// A record acquired or released its preload slot.
    pub fn on_preload_allocated_changed(&mut self, allocated: bool) {
        if allocated {
            self.preload_allocated += 1;
        } else {
            decrement(&mut self.preload_allocated, "preload-allocated");
        }
    }

    /// A record went from zero attempted platforms to one.
    pub fn on_first_cooked_platform_added(&mut self) {
        self.cooked += 1;
    }

    /// A record's last attempted platform was cleared.
    pub fn on_last_cooked_platform_removed(&mut self) {
        decrement(&mut self.cooked, "cooked");
    }

    /// A record in `state` changed urgency.
    pub fn on_urgency_changed(&mut self, state: PackageState, urgent: bool) {
        let slot = &mut self.urgent_by_state[state.index()];
        if urgent {
            *slot += 1;
        } else {
            decrement(slot, "urgent");
        }
    }

    /// A record moved between states with the given urgency.
    pub fn on_state_changed(&mut self, old: PackageState, new: PackageState, urgent: bool) {
        if urgent && old != new {
            decrement(&mut self.urgent_by_state[old.index()], "urgent");
            self.urgent_by_state[new.index()] += 1;
        }
    }

    /// Records between Request and Save.
    #[must_use]
    pub const fn in_progress_count(&self) -> usize {
        self.in_progress
    }

    /// Records holding a preload slot.
    #[must_use]
    pub const fn preload_allocated_count(&self) -> usize {
        self.preload_allocated
    }

    /// Records with at least one attempted platform.
    #[must_use]
    pub const fn cooked_count(&self) -> usize {
        self.cooked
    }

    /// Urgent records currently in `state`.
    #[must_use]
    pub const fn urgent_count(&self, state: PackageState) -> usize {
        self.urgent_by_state[state.index()]
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub const fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            in_progress: self.in_progress,
            preload_allocated: self.preload_allocated,
            cooked: self.cooked,
            urgent_by_state: self.urgent_by_state,
        }
    }
}

//! Stage queues. A record is a member of exactly the queue of its current
//! state; Idle has none.

pub mod load;
pub mod request;
pub mod save;
pub mod ticket;

pub use load::LoadQueue;
pub use request::RequestQueue;
pub use save::{LoadReadyQueue, PriorityDeque, SaveQueue};
pub use ticket::TicketDeque;

use crate::core::record::{PackageRecord, RecordId};
use crate::core::state::PackageState;

/// One queue per in-progress state.
#[derive(Debug, Default, Clone)]
pub struct StageQueues {
    /// Request stage.
    pub request: RequestQueue,
    /// LoadPrepare stage.
    pub load_prepare: LoadQueue,
    /// LoadReady stage.
    pub load_ready: LoadReadyQueue,
    /// Save stage.
    pub save: SaveQueue,
}

impl StageQueues {
    /// Empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` into the queue of `state`, honouring its urgency.
    pub fn enqueue(&mut self, state: PackageState, record: &PackageRecord) {
        let (id, urgent) = (record.id(), record.is_urgent());
        match state {
            PackageState::Idle => {}
            PackageState::Request => {
                self.request
                    .add_request(id, record.are_requested_platforms_explored(), urgent);
            }
            PackageState::LoadPrepare => self.load_prepare.push(id, urgent),
            PackageState::LoadReady => self.load_ready.push(id, urgent),
            PackageState::Save => self.save.push(id, urgent),
        }
    }

    /// Remove `id` from the queue of `state`. Always false for Idle.
    pub fn remove(&mut self, state: PackageState, id: RecordId) -> bool {
        match state {
            PackageState::Idle => false,
            PackageState::Request => self.request.remove(id),
            PackageState::LoadPrepare => self.load_prepare.remove(id),
            PackageState::LoadReady => self.load_ready.remove(id),
            PackageState::Save => self.save.remove(id),
        }
    }

    /// Membership in the queue of `state`.
    #[must_use]
    pub fn contains(&self, state: PackageState, id: RecordId) -> bool {
        match state {
            PackageState::Idle => false,
            PackageState::Request => self.request.contains(id),
            PackageState::LoadPrepare => self.load_prepare.contains(id),
            PackageState::LoadReady => self.load_ready.contains(id),
            PackageState::Save => self.save.contains(id),
        }
    }

    /// Length of the queue of `state`.
    #[must_use]
    pub fn len(&self, state: PackageState) -> usize {
        match state {
            PackageState::Idle => 0,
            PackageState::Request => self.request.len(),
            PackageState::LoadPrepare => self.load_prepare.len(),
            PackageState::LoadReady => self.load_ready.len(),
            PackageState::Save => self.save.len(),
        }
    }

    /// Whether every queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        PackageState::ALL.iter().all(|state| self.len(*state) == 0)
    }
}

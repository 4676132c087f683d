//! Polled tracking of outstanding per-object platform-data builds.
//!
//! A [`PendingAsyncBuild`] never blocks. When several pending builds for one
//! object are abandoned together they share a [`CancelManager`], which clears
//! the object's cached data once, after the last of them is released.

use std::sync::{Arc, Weak};

use slab::Slab;

use crate::core::collaborators::CookableObject;
use crate::core::record::{PackageRecord, PlatformId, RecordId};

/// Handle of a cancel manager in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelId(usize);

/// Collapsing refcount shared by the abandoned builds of one object.
#[derive(Debug)]
pub struct CancelManager {
    object: Weak<dyn CookableObject>,
    remaining: u32,
}

/// Arena of live cancel managers.
#[derive(Debug, Default)]
pub struct CancelManagers {
    managers: Slab<CancelManager>,
}

impl CancelManagers {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager for `object` awaiting `count` releases.
    pub fn create(&mut self, object: &Arc<dyn CookableObject>, count: u32) -> CancelId {
        assert!(count > 0, "cancel manager needs at least one pending build");
        CancelId(self.managers.insert(CancelManager {
            object: Arc::downgrade(object),
            remaining: count,
        }))
    }

    /// Drop one reference. On the last one, clear the object's cached data and
    /// free the manager. Returns true if the clear ran.
    pub fn release(&mut self, id: CancelId) -> bool {
        let manager = self
            .managers
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("cancel manager {id:?} released after it was freed"));
        manager.remaining -= 1;
        if manager.remaining > 0 {
            return false;
        }
        let manager = self.managers.remove(id.0);
        if let Some(object) = manager.object.upgrade() {
            tracing::debug!(object = object.name(), "clearing cached platform data of cancelled builds");
            object.clear_all_cached_platform_data();
        }
        true
    }

    /// Live managers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no manager is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

/// One outstanding "finish building `object` for `platform`" request.
#[derive(Debug)]
pub struct PendingAsyncBuild {
    owner: RecordId,
    object: Weak<dyn CookableObject>,
    platform: PlatformId,
    cancel: Option<CancelId>,
    released: bool,
}

impl PendingAsyncBuild {
    /// Start tracking; counts against `owner`'s pending builds.
    pub(crate) fn new(owner: &mut PackageRecord, object: &Arc<dyn CookableObject>, platform: PlatformId) -> Self {
        owner.pending_async_builds += 1;
        Self {
            owner: owner.id(),
            object: Arc::downgrade(object),
            platform,
            cancel: None,
            released: false,
        }
    }

    /// Record that owns this build.
    #[must_use]
    pub const fn owner(&self) -> RecordId {
        self.owner
    }

    /// Target platform.
    #[must_use]
    pub const fn platform(&self) -> PlatformId {
        self.platform
    }

    /// Whether this build tracks `object`.
    #[must_use]
    pub fn is_for_object(&self, object: &Arc<dyn CookableObject>) -> bool {
        std::ptr::addr_eq(self.object.as_ptr(), Arc::as_ptr(object))
    }

    /// Whether a cancel manager has been attached.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancel.is_some()
    }

    /// Whether `release` has run.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    pub(crate) fn attach_cancel_manager(&mut self, id: CancelId) {
        assert!(self.cancel.is_none(), "pending build already has a cancel manager");
        self.cancel = Some(id);
    }

    /// Non-blocking completion check. A destroyed object counts as complete.
    pub fn poll_is_complete(&self) -> bool {
        self.object
            .upgrade()
            .is_none_or(|object| object.is_cached_platform_data_loaded(self.platform))
    }

    /// Stop tracking. Idempotent.
    pub fn release(&mut self, owner: &mut PackageRecord, cancels: &mut CancelManagers) {
        if self.released {
            return;
        }
        assert_eq!(owner.id(), self.owner, "pending build released against the wrong record");
        self.released = true;
        assert!(
            owner.pending_async_builds > 0,
            "pending build count of {} would go negative",
            owner.package_name()
        );
        owner.pending_async_builds -= 1;
        if let Some(id) = self.cancel.take() {
            cancels.release(id);
        }
    }
}

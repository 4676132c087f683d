//! Package pipeline states and the property tables that drive transitions.
//!
//! Each [`PackageState`] maps to a set of orthogonal [`StateProperties`]. A
//! transition only pays setup or teardown for properties that are genuinely
//! entered or exited: exits run from the most dependent property down, enters
//! from the least dependent up.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Stage of a package record in the cook pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    /// Not requested; only persistent per-platform results are kept.
    Idle,
    /// Requested, awaiting dependency exploration or admission to load.
    Request,
    /// Waiting for its package bytes to preload.
    LoadPrepare,
    /// Preload finished, waiting for the synchronous load.
    LoadReady,
    /// Loaded; building per-object platform data and committing results.
    Save,
}

impl PackageState {
    /// Number of states.
    pub const COUNT: usize = 5;

    /// All states in pipeline order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Request,
        Self::LoadPrepare,
        Self::LoadReady,
        Self::Save,
    ];

    /// Dense index, usable for per-state counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Properties held while in this state.
    #[must_use]
    pub const fn properties(self) -> StateProperties {
        match self {
            Self::Idle => StateProperties::empty(),
            Self::Request => StateProperties::IN_PROGRESS,
            Self::LoadPrepare => StateProperties::IN_PROGRESS.union(StateProperties::LOADING),
            Self::LoadReady => StateProperties::IN_PROGRESS
                .union(StateProperties::LOADING)
                .union(StateProperties::HAS_PACKAGE),
            Self::Save => StateProperties::IN_PROGRESS.union(StateProperties::HAS_PACKAGE),
        }
    }

    /// Whether this state counts as in progress.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        self.properties().contains(StateProperties::IN_PROGRESS)
    }
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Request => "request",
            Self::LoadPrepare => "load_prepare",
            Self::LoadReady => "load_ready",
            Self::Save => "save",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Orthogonal capabilities a state may hold. Higher bits depend on lower bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateProperties: u8 {
        /// Record has an outstanding request and a completion callback slot.
        const IN_PROGRESS = 1 << 0;
        /// Record may hold preload resources.
        const LOADING = 1 << 1;
        /// Record may hold a loaded package and its object cache.
        const HAS_PACKAGE = 1 << 2;
    }
}

impl StateProperties {
    /// Iteration order for enter hooks: least dependent first.
    pub const ENTER_ORDER: [Self; 3] = [Self::IN_PROGRESS, Self::LOADING, Self::HAS_PACKAGE];
    /// Iteration order for exit hooks: most dependent first.
    pub const EXIT_ORDER: [Self; 3] = [Self::HAS_PACKAGE, Self::LOADING, Self::IN_PROGRESS];

    /// Properties held by `old` but not `new`, in exit order.
    pub fn exited(old: PackageState, new: PackageState) -> impl Iterator<Item = Self> {
        let (old, new) = (old.properties(), new.properties());
        Self::EXIT_ORDER
            .into_iter()
            .filter(move |p| old.contains(*p) && !new.contains(*p))
    }

    /// Properties held by `new` but not `old`, in enter order.
    pub fn entered(old: PackageState, new: PackageState) -> impl Iterator<Item = Self> {
        let (old, new) = (old.properties(), new.properties());
        Self::ENTER_ORDER
            .into_iter()
            .filter(move |p| new.contains(*p) && !old.contains(*p))
    }
}

bitflags! {
    /// Queue bookkeeping requested for a state transition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SendFlags: u8 {
        /// Remove the record from the queue of the state being exited.
        const QUEUE_REMOVE = 1 << 0;
        /// Insert the record into the queue of the state being entered.
        const QUEUE_ADD = 1 << 1;
        /// Both of the above.
        const QUEUE_ADD_AND_REMOVE = Self::QUEUE_REMOVE.bits() | Self::QUEUE_ADD.bits();
    }
}

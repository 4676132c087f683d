//! Per-package state record and its per-platform bookkeeping.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::core::collaborators::{CookableObject, LoadedPackage, PreloadHandle};
use crate::core::generator::GeneratorId;
use crate::core::state::PackageState;

/// Stable index of a record in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub(crate) u32);

impl RecordId {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const UNASSIGNED: Self = Self(u32::MAX);
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Target platform identifier. Ordering is the session-stable platform order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformId(pub u16);

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform:{}", self.0)
    }
}

/// Per-platform flags of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformData {
    /// Part of the current in-progress request. Cleared on return to Idle.
    pub requested: bool,
    /// Dependencies have been explored for this platform.
    pub explored: bool,
    /// A save was attempted.
    pub cook_attempted: bool,
    /// The attempted save succeeded.
    pub cook_succeeded: bool,
}

/// Why a record was first requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstigatorCategory {
    /// Named directly by the session's caller.
    RequestedByUser,
    /// Discovered as a dependency of another record.
    Dependency,
    /// Produced by a package splitter.
    GeneratedPackage,
    /// Requested without a known referencer.
    Unsolicited,
}

/// First-ever requester of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instigator {
    /// Kind of request.
    pub category: InstigatorCategory,
    /// Referencing package, when there is one.
    pub referencer: Option<String>,
}

impl Instigator {
    /// Direct user request.
    #[must_use]
    pub const fn user() -> Self {
        Self {
            category: InstigatorCategory::RequestedByUser,
            referencer: None,
        }
    }

    /// Dependency of `referencer`.
    pub fn dependency(referencer: impl Into<String>) -> Self {
        Self {
            category: InstigatorCategory::Dependency,
            referencer: Some(referencer.into()),
        }
    }

    /// Generated by the splitter of `owner`.
    pub fn generated(owner: impl Into<String>) -> Self {
        Self {
            category: InstigatorCategory::GeneratedPackage,
            referencer: Some(owner.into()),
        }
    }
}

/// Fired exactly once when a record leaves the in-progress states.
pub type CompletionCallback = Box<dyn FnOnce(&PackageRecord) + Send>;

/// Effect of a cooked-flag change on the "has any cooked platform" aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookedTransition {
    /// The record went from no attempted platform to one.
    FirstAdded,
    /// The record's last attempted platform was cleared.
    LastRemoved,
    /// The aggregate is unaffected.
    Unchanged,
}

/// Position of the Save stage's begin-cache walk: object index, then an index
/// into the record's requested platforms in platform order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SaveCursor {
    pub(crate) object_index: usize,
    pub(crate) platform_index: usize,
}

/// The per-package state-machine entity. Lives for the whole session.
pub struct PackageRecord {
    pub(crate) id: RecordId,
    package_name: String,
    file_name: String,
    pub(crate) state: PackageState,
    platforms: BTreeMap<PlatformId, PlatformData>,
    instigator: Option<Instigator>,

    // In-progress data, cleared on return to Idle.
    pub(crate) urgent: bool,
    pub(crate) completion: Option<CompletionCallback>,
    pub(crate) package: Option<Arc<LoadedPackage>>,
    pub(crate) object_cache: Vec<Weak<dyn CookableObject>>,
    pub(crate) object_cache_built: bool,
    pub(crate) save_cursor: SaveCursor,
    pub(crate) preload: Option<Box<dyn PreloadHandle>>,
    pub(crate) preload_attempted: bool,
    pub(crate) preload_registered: bool,
    pub(crate) preload_allocated: bool,

    pub(crate) pending_async_builds: u32,
    pub(crate) generator: Option<GeneratorId>,
    pub(crate) generated_by: Option<GeneratorId>,
}

impl PackageRecord {
    pub(crate) fn new(package_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: RecordId::UNASSIGNED,
            package_name: package_name.into(),
            file_name: file_name.into(),
            state: PackageState::Idle,
            platforms: BTreeMap::new(),
            instigator: None,
            urgent: false,
            completion: None,
            package: None,
            object_cache: Vec::new(),
            object_cache_built: false,
            save_cursor: SaveCursor::default(),
            preload: None,
            preload_attempted: false,
            preload_registered: false,
            preload_allocated: false,
            pending_async_builds: 0,
            generator: None,
            generated_by: None,
        }
    }

    /// Arena identity.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// File name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Current pipeline state.
    #[must_use]
    pub const fn state(&self) -> PackageState {
        self.state
    }

    /// Whether the record is anywhere between Request and Save.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        self.state.is_in_progress()
    }

    /// Urgency of the current request.
    #[must_use]
    pub const fn is_urgent(&self) -> bool {
        self.urgent
    }

    /// First-ever requester.
    #[must_use]
    pub const fn instigator(&self) -> Option<&Instigator> {
        self.instigator.as_ref()
    }

    /// Whether a completion callback is waiting on this record.
    #[must_use]
    pub const fn has_completion_callback(&self) -> bool {
        self.completion.is_some()
    }

    /// Loaded package, while in LoadReady or Save.
    #[must_use]
    pub const fn package(&self) -> Option<&Arc<LoadedPackage>> {
        self.package.as_ref()
    }

    /// Outstanding asynchronous platform-data builds owned by this record.
    #[must_use]
    pub const fn pending_async_builds(&self) -> u32 {
        self.pending_async_builds
    }

    /// Whether a preload slot is currently held.
    #[must_use]
    pub const fn is_preload_allocated(&self) -> bool {
        self.preload_allocated
    }

    /// Generator this record owns, if its package is split.
    #[must_use]
    pub const fn generator(&self) -> Option<GeneratorId> {
        self.generator
    }

    /// Generator that produced this record.
    #[must_use]
    pub const fn generated_by(&self) -> Option<GeneratorId> {
        self.generated_by
    }

    /// Whether this record was produced by a splitter.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated_by.is_some()
    }

    /// Per-platform flags in platform order.
    pub fn platforms(&self) -> impl Iterator<Item = (PlatformId, &PlatformData)> {
        self.platforms.iter().map(|(p, d)| (*p, d))
    }

    /// Flags for one platform.
    #[must_use]
    pub fn platform(&self, platform: PlatformId) -> Option<&PlatformData> {
        self.platforms.get(&platform)
    }

    /// Requested platforms in platform order.
    #[must_use]
    pub fn requested_platforms(&self) -> Vec<PlatformId> {
        self.platforms
            .iter()
            .filter(|(_, d)| d.requested)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Requested platforms that have not been attempted yet.
    #[must_use]
    pub fn platforms_needing_cook(&self) -> Vec<PlatformId> {
        self.platforms
            .iter()
            .filter(|(_, d)| d.requested && !d.cook_attempted)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Requested platforms whose dependencies are not explored.
    #[must_use]
    pub fn unexplored_requested_platforms(&self) -> Vec<PlatformId> {
        self.platforms
            .iter()
            .filter(|(_, d)| d.requested && !d.explored)
            .map(|(p, _)| *p)
            .collect()
    }

    /// True when every requested platform has been explored.
    #[must_use]
    pub fn are_requested_platforms_explored(&self) -> bool {
        self.platforms.values().all(|d| !d.requested || d.explored)
    }

    /// Whether `platform` has been attempted (and succeeded, unless `include_failed`).
    #[must_use]
    pub fn has_cooked_platform(&self, platform: PlatformId, include_failed: bool) -> bool {
        self.platforms
            .get(&platform)
            .is_some_and(|d| d.cook_attempted && (include_failed || d.cook_succeeded))
    }

    /// Whether any platform has been attempted.
    #[must_use]
    pub fn has_any_cooked_platform(&self) -> bool {
        self.platforms.values().any(|d| d.cook_attempted)
    }

    /// Mark `platforms` requested. Returns true if any was not requested before.
    pub(crate) fn add_requested_platforms(&mut self, platforms: &[PlatformId]) -> bool {
        let mut added = false;
        for platform in platforms {
            let data = self.platforms.entry(*platform).or_default();
            if !data.requested {
                data.requested = true;
                added = true;
            }
        }
        added
    }

    pub(crate) fn mark_platforms_explored(&mut self, platforms: &[PlatformId]) {
        for platform in platforms {
            self.platforms.entry(*platform).or_default().explored = true;
        }
    }

    pub(crate) fn set_instigator_if_none(&mut self, instigator: Instigator) {
        if self.instigator.is_none() {
            self.instigator = Some(instigator);
        }
    }

    /// Record a save attempt. Idempotent for the aggregate.
    pub(crate) fn set_platform_cooked(&mut self, platform: PlatformId, succeeded: bool) -> CookedTransition {
        let had_any = self.has_any_cooked_platform();
        let data = self.platforms.entry(platform).or_default();
        data.cook_attempted = true;
        data.cook_succeeded = succeeded;
        if had_any {
            CookedTransition::Unchanged
        } else {
            CookedTransition::FirstAdded
        }
    }

    /// Forget a save attempt. Idempotent for the aggregate.
    pub(crate) fn set_platform_not_cooked(&mut self, platform: PlatformId) -> CookedTransition {
        let Some(data) = self.platforms.get_mut(&platform) else {
            return CookedTransition::Unchanged;
        };
        if !data.cook_attempted {
            return CookedTransition::Unchanged;
        }
        data.cook_attempted = false;
        data.cook_succeeded = false;
        if self.has_any_cooked_platform() {
            CookedTransition::Unchanged
        } else {
            CookedTransition::LastRemoved
        }
    }

    /// Clear request flags and hand back the completion callback.
    pub(crate) fn clear_in_progress_data(&mut self) -> Option<CompletionCallback> {
        for data in self.platforms.values_mut() {
            data.requested = false;
        }
        self.completion.take()
    }

    /// Rekey platforms through `remap`. Returns true if the relative order of
    /// the surviving keys changed.
    pub(crate) fn remap_platforms(&mut self, remap: &HashMap<PlatformId, PlatformId>) -> bool {
        let old: Vec<(PlatformId, PlatformData)> = std::mem::take(&mut self.platforms)
            .into_iter()
            .map(|(p, d)| (remap.get(&p).copied().unwrap_or(p), d))
            .collect();
        for (platform, data) in &old {
            let merged = self.platforms.entry(*platform).or_default();
            merged.requested |= data.requested;
            merged.explored |= data.explored;
            merged.cook_attempted |= data.cook_attempted;
            merged.cook_succeeded |= data.cook_succeeded;
        }
        let before = old.iter().map(|(p, _)| *p);
        let after = self.platforms.keys().copied();
        !before.eq(after)
    }

    pub(crate) fn rename(&mut self, package_name: String, file_name: String) {
        self.package_name = package_name;
        self.file_name = file_name;
    }
}

impl fmt::Debug for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageRecord")
            .field("id", &self.id)
            .field("package_name", &self.package_name)
            .field("state", &self.state)
            .field("urgent", &self.urgent)
            .field("platforms", &self.platforms)
            .field("pending_async_builds", &self.pending_async_builds)
            .finish_non_exhaustive()
    }
}

//! Contracts for the collaborators the scheduler drives but does not implement.

use std::sync::Arc;

use crate::core::record::{PackageRecord, PlatformId};

/// Maps package names to files and back. Must be deterministic for a given
/// on-disk state within one session.
pub trait NameResolver: Send + Sync {
    /// File backing `package_name`, if it exists on disk.
    fn lookup_file_name_on_disk(&self, package_name: &str) -> Option<String>;
    /// Package name stored in `file_name`, if the file exists on disk.
    fn lookup_package_name_on_disk(&self, file_name: &str) -> Option<String>;
    /// Location `package_name` would occupy under its mount point, whether or
    /// not a file exists there.
    fn mounted_file_name(&self, package_name: &str) -> Option<String>;
    /// Direct existence check, used for collision detection and as the
    /// fallback when the asset index has no entry.
    fn file_exists(&self, file_name: &str) -> bool;
}

/// Optional fast lookup of packages known to the asset registry.
pub trait AssetIndex: Send + Sync {
    /// File name recorded for `package_name`.
    fn lookup_file_name(&self, package_name: &str) -> Option<String>;
}

/// Pollable handle to an in-flight preload of package bytes.
pub trait PreloadHandle: Send {
    /// Cheap non-blocking completion check.
    fn poll_is_complete(&mut self) -> bool;
    /// Block the calling thread until the preload finishes.
    fn wait_until_complete(&mut self);
}

/// Source of asynchronous package preloads.
///
/// Registration is advisory. Failing to register or to find the file degrades
/// to "preload attempted, nothing cached".
pub trait PreloadProvider {
    /// Start reading `file_name`; `None` when nothing can be preloaded.
    fn open_read_package(&mut self, file_name: &str) -> Option<Box<dyn PreloadHandle>>;
    /// Offer a started preload to the loader. Returns false if not accepted.
    fn try_register_preloadable_archive(&mut self, file_name: &str, handle: &dyn PreloadHandle) -> bool;
    /// Withdraw a registration made by `try_register_preloadable_archive`.
    fn unregister_preloadable_archive(&mut self, file_name: &str);
}

/// An object inside a loaded package whose platform data is built asynchronously.
pub trait CookableObject: Send + Sync {
    /// Object path, for logging.
    fn name(&self) -> &str;
    /// Kick off the asynchronous platform-data build for `platform`.
    fn begin_cache_for_platform(&self, platform: PlatformId);
    /// Non-blocking readiness predicate for `platform`.
    fn is_cached_platform_data_loaded(&self, platform: PlatformId) -> bool;
    /// Drop every cached platform build. Destructive.
    fn clear_all_cached_platform_data(&self);
}

/// A package loaded into memory, owning its objects.
pub struct LoadedPackage {
    name: String,
    objects: Vec<Arc<dyn CookableObject>>,
}

impl LoadedPackage {
    /// Create a loaded package from its objects.
    pub fn new(name: impl Into<String>, objects: Vec<Arc<dyn CookableObject>>) -> Self {
        Self {
            name: name.into(),
            objects,
        }
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Objects contained in the package.
    #[must_use]
    pub fn objects(&self) -> &[Arc<dyn CookableObject>] {
        &self.objects
    }
}

impl std::fmt::Debug for LoadedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPackage")
            .field("name", &self.name)
            .field("objects", &self.objects.len())
            .finish()
    }
}

/// Orchestrator hooks for the load and save steps.
pub trait CookDriver {
    /// Synchronously load the record's package, consuming any registered preload.
    fn load_package(&mut self, record: &PackageRecord) -> Option<Arc<LoadedPackage>>;

    /// Write the platform artifact. Returns whether the save succeeded.
    fn save_package(&mut self, record: &PackageRecord, package: &LoadedPackage, platform: PlatformId) -> bool;

    /// Called on Save exit for each object with no outstanding async build.
    fn release_cooked_platform_data(&mut self, record: &PackageRecord, object: &dyn CookableObject) {
        let _ = record;
        object.clear_all_cached_platform_data();
    }
}

/// Result of one dependency-exploration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExploreOutcome {
    /// Every requested platform was explored; these packages are dependencies.
    Explored {
        /// Package names the record depends on.
        dependencies: Vec<String>,
    },
    /// Not yet possible; leave the record unclustered for a later pass.
    Deferred,
}

/// Dependency-discovery ("clustering") service.
///
/// Must not report `Explored` unless it explored every platform it was given.
pub trait DependencyExplorer {
    /// Explore `record` for the listed requested-but-unexplored platforms.
    fn explore(&mut self, record: &PackageRecord, platforms: &[PlatformId]) -> ExploreOutcome;
}

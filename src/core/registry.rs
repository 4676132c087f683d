//! Session-wide owner of every package record.
//!
//! Records live in an arena and are addressed by [`RecordId`]; back-references
//! (generated record to generator, pending build to record) are arena indices.
//! The name and file maps sit behind a read-write lock so bulk lookups can run
//! in parallel; every insertion goes through a single writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::async_build::{CancelManagers, PendingAsyncBuild};
use crate::core::collaborators::{AssetIndex, CookableObject, LoadedPackage, NameResolver};
use crate::core::error::CookError;
use crate::core::generator::{GeneratorId, GeneratorPackage, SplitPolicy};
use crate::core::record::{PackageRecord, PlatformId, RecordId};
use crate::core::state::PackageState;
use crate::util::clock::PollThrottle;

/// Explicit session context threaded into the registry.
#[derive(Clone)]
pub struct CookContext {
    /// Scheduler tuning.
    pub config: SchedulerConfig,
    /// Optional asset index consulted before the file system.
    pub asset_index: Option<Arc<dyn AssetIndex>>,
    /// Identifier of this cook session, for log correlation.
    pub session_id: Uuid,
}

impl CookContext {
    /// Context with a fresh session id and no asset index.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            asset_index: None,
            session_id: Uuid::new_v4(),
        }
    }

    /// Attach an asset index.
    #[must_use]
    pub fn with_asset_index(mut self, asset_index: Arc<dyn AssetIndex>) -> Self {
        self.asset_index = Some(asset_index);
        self
    }
}

/// Outcome of the post-garbage-collection generator check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcValidation {
    /// Generators broken because their owner or split object was collected.
    pub errors: usize,
    /// Generators whose owner survived collection after leaving Save.
    pub warnings: usize,
}

#[derive(Debug, Default)]
struct IdentityIndex {
    by_package: HashMap<String, RecordId>,
    by_file: HashMap<String, RecordId>,
}

/// Record arena plus the identity maps over it.
pub(crate) struct RecordStore {
    records: Vec<PackageRecord>,
    index: RwLock<IdentityIndex>,
    resolver: Arc<dyn NameResolver>,
    asset_index: Option<Arc<dyn AssetIndex>>,
}

enum BulkLookup {
    Existing(RecordId),
    Create(PackageRecord),
    Missing,
}

impl RecordStore {
    fn new(resolver: Arc<dyn NameResolver>, asset_index: Option<Arc<dyn AssetIndex>>) -> Self {
        Self {
            records: Vec::new(),
            index: RwLock::new(IdentityIndex::default()),
            resolver,
            asset_index,
        }
    }

    pub(crate) fn record(&self, id: RecordId) -> &PackageRecord {
        &self.records[id.index()]
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> &mut PackageRecord {
        &mut self.records[id.index()]
    }

    fn find_by_package_name(&self, package_name: &str) -> Option<RecordId> {
        self.index.read().by_package.get(package_name).copied()
    }

    fn find_by_file_name(&self, file_name: &str) -> Option<RecordId> {
        self.index.read().by_file.get(file_name).copied()
    }

    fn lookup_file_name_on_disk(&self, package_name: &str) -> Option<String> {
        let Some(asset_index) = &self.asset_index else {
            return self.resolver.lookup_file_name_on_disk(package_name);
        };
        if let Some(file_name) = asset_index.lookup_file_name(package_name) {
            return Some(file_name);
        }
        let file_name = self.resolver.lookup_file_name_on_disk(package_name)?;
        warn!(
            package = package_name,
            file = %file_name,
            "asset index is missing a package that exists on disk"
        );
        Some(file_name)
    }

    /// Single-writer insertion. A record that lost a creation race to an
    /// identical one is discarded in favour of the existing record.
    fn insert_record(&mut self, mut record: PackageRecord) -> Result<RecordId, CookError> {
        let mut index = self.index.write();
        if let Some(&existing) = index.by_package.get(record.package_name()) {
            let existing_file = self.records[existing.index()].file_name();
            if existing_file == record.file_name() {
                return Ok(existing);
            }
            return Err(CookError::IdentityConflict {
                package: record.package_name().to_owned(),
                file: record.file_name().to_owned(),
                reason: format!("package is already bound to {existing_file}"),
            });
        }
        if let Some(&existing) = index.by_file.get(record.file_name()) {
            return Err(CookError::IdentityConflict {
                package: record.package_name().to_owned(),
                file: record.file_name().to_owned(),
                reason: format!(
                    "file is already bound to {}",
                    self.records[existing.index()].package_name()
                ),
            });
        }
        let id = RecordId(u32::try_from(self.records.len()).map_err(|_| CookError::CapacityExceeded)?);
        record.id = id;
        index.by_package.insert(record.package_name().to_owned(), id);
        index.by_file.insert(record.file_name().to_owned(), id);
        self.records.push(record);
        Ok(id)
    }

    pub(crate) fn find_or_add_by_names(&mut self, package_name: &str, file_name: &str) -> Result<RecordId, CookError> {
        self.insert_record(PackageRecord::new(package_name, file_name))
    }

    /// Resolve where a generated package would live and reject collisions.
    pub(crate) fn plan_generated_record(&self, package_name: &str) -> Result<String, CookError> {
        let file_name = self
            .resolver
            .mounted_file_name(package_name)
            .ok_or_else(|| CookError::UnresolvedPackage(package_name.to_owned()))?;
        if self.resolver.file_exists(&file_name) {
            return Err(CookError::FileCollision {
                package: package_name.to_owned(),
                file: file_name,
            });
        }
        if let Some(existing) = self.find_by_file_name(&file_name) {
            let bound = self.record(existing).package_name();
            if bound != package_name {
                return Err(CookError::IdentityConflict {
                    package: package_name.to_owned(),
                    file: file_name,
                    reason: format!("file is already bound to {bound}"),
                });
            }
        }
        Ok(file_name)
    }
}

/// Owns all records, generators and pending async builds of a session.
pub struct Registry {
    store: RecordStore,
    generators: Vec<GeneratorPackage>,
    pending: Vec<PendingAsyncBuild>,
    cancels: CancelManagers,
    throttle: PollThrottle,
    context: CookContext,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(resolver: Arc<dyn NameResolver>, context: CookContext) -> Self {
        let interval = Duration::from_millis(context.config.poll_interval_ms);
        Self {
            store: RecordStore::new(resolver, context.asset_index.clone()),
            generators: Vec::new(),
            pending: Vec::new(),
            cancels: CancelManagers::new(),
            throttle: PollThrottle::new(interval),
            context,
        }
    }

    /// Session context.
    #[must_use]
    pub const fn context(&self) -> &CookContext {
        &self.context
    }

    /// Scheduler tuning.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.context.config
    }

    /// Number of records created this session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.records.len()
    }

    /// Whether no record exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.records.is_empty()
    }

    /// Record by id.
    #[must_use]
    pub fn record(&self, id: RecordId) -> &PackageRecord {
        self.store.record(id)
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> &mut PackageRecord {
        self.store.record_mut(id)
    }

    /// Every record in creation order.
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.store.records.iter()
    }

    /// Existing record for a package name.
    #[must_use]
    pub fn find_by_package_name(&self, package_name: &str) -> Option<RecordId> {
        self.store.find_by_package_name(package_name)
    }

    /// Existing record for a file name.
    #[must_use]
    pub fn find_by_file_name(&self, file_name: &str) -> Option<RecordId> {
        self.store.find_by_file_name(file_name)
    }

    /// File for `package_name`: asset index first, then the file system.
    #[must_use]
    pub fn lookup_file_name_on_disk(&self, package_name: &str) -> Option<String> {
        self.store.lookup_file_name_on_disk(package_name)
    }

    /// Find or create the record for a package name. Logs and returns `None`
    /// when the name is unmounted or the package is not on disk.
    pub fn find_or_add_by_package_name(&mut self, package_name: &str) -> Option<RecordId> {
        if let Some(id) = self.find_by_package_name(package_name) {
            return Some(id);
        }
        if self.store.resolver.mounted_file_name(package_name).is_none() {
            error!("{}", CookError::UnresolvedPackage(package_name.to_owned()));
            return None;
        }
        let Some(file_name) = self.lookup_file_name_on_disk(package_name) else {
            warn!("{}", CookError::MissingFile(package_name.to_owned()));
            return None;
        };
        self.insert_logged(PackageRecord::new(package_name, file_name))
    }

    /// Find or create the record for a file name.
    pub fn find_or_add_by_file_name(&mut self, file_name: &str) -> Option<RecordId> {
        if let Some(id) = self.find_by_file_name(file_name) {
            return Some(id);
        }
        let Some(package_name) = self.store.resolver.lookup_package_name_on_disk(file_name) else {
            warn!("{}", CookError::MissingFile(file_name.to_owned()));
            return None;
        };
        self.insert_logged(PackageRecord::new(package_name, file_name))
    }

    /// Find or create a record whose name and file are both known.
    pub fn find_or_add_by_names(&mut self, package_name: &str, file_name: &str) -> Result<RecordId, CookError> {
        self.store.find_or_add_by_names(package_name, file_name)
    }

    /// Bulk variant of [`Self::find_or_add_by_file_name`]. Lookups run in
    /// parallel under the read lock and only compute what they would create;
    /// insertions happen afterwards on this thread.
    pub fn find_or_add_by_file_names_parallel(&mut self, file_names: &[String]) -> Vec<Option<RecordId>> {
        let lookups: Vec<BulkLookup> = {
            let index = &self.store.index;
            let resolver = self.store.resolver.as_ref();
            file_names
                .par_iter()
                .map(|file_name| {
                    if let Some(&id) = index.read().by_file.get(file_name.as_str()) {
                        return BulkLookup::Existing(id);
                    }
                    resolver
                        .lookup_package_name_on_disk(file_name)
                        .map_or(BulkLookup::Missing, |package_name| {
                            BulkLookup::Create(PackageRecord::new(package_name, file_name.clone()))
                        })
                })
                .collect()
        };

        lookups
            .into_iter()
            .zip(file_names)
            .map(|(lookup, file_name)| match lookup {
                BulkLookup::Existing(id) => Some(id),
                BulkLookup::Create(record) => self.insert_logged(record),
                BulkLookup::Missing => {
                    warn!("{}", CookError::MissingFile(file_name.clone()));
                    None
                }
            })
            .collect()
    }

    fn insert_logged(&mut self, record: PackageRecord) -> Option<RecordId> {
        match self.store.insert_record(record) {
            Ok(id) => Some(id),
            Err(err) => {
                error!("{err}");
                None
            }
        }
    }

    /// Rebind a record to a new package and file name.
    pub fn rename(&mut self, id: RecordId, package_name: &str, file_name: &str) -> Result<(), CookError> {
        let store = &mut self.store;
        let mut index = store.index.write();
        let conflict = |reason: &str| CookError::IdentityConflict {
            package: package_name.to_owned(),
            file: file_name.to_owned(),
            reason: reason.to_owned(),
        };
        if index.by_package.get(package_name).is_some_and(|other| *other != id) {
            return Err(conflict("package name is bound to another record"));
        }
        if index.by_file.get(file_name).is_some_and(|other| *other != id) {
            return Err(conflict("file name is bound to another record"));
        }
        let record = &mut store.records[id.index()];
        index.by_package.remove(record.package_name());
        index.by_file.remove(record.file_name());
        index.by_package.insert(package_name.to_owned(), id);
        index.by_file.insert(file_name.to_owned(), id);
        debug!(from = record.package_name(), to = package_name, "renamed package record");
        record.rename(package_name.to_owned(), file_name.to_owned());
        Ok(())
    }

    /// Attach a generator to `owner` for the given split source.
    pub fn create_generator(
        &mut self,
        owner: RecordId,
        policy: Arc<dyn SplitPolicy>,
        owner_package: &Arc<LoadedPackage>,
        split_object: &Arc<dyn CookableObject>,
    ) -> Result<GeneratorId, CookError> {
        assert!(
            self.record(owner).generator.is_none(),
            "{} already owns a generator",
            self.record(owner).package_name()
        );
        let id = GeneratorId(u32::try_from(self.generators.len()).map_err(|_| CookError::CapacityExceeded)?);
        self.generators
            .push(GeneratorPackage::new(id, owner, policy, owner_package, split_object));
        self.record_mut(owner).generator = Some(id);
        Ok(id)
    }

    /// Generator by id.
    #[must_use]
    pub fn generator(&self, id: GeneratorId) -> &GeneratorPackage {
        &self.generators[id.index()]
    }

    /// Every generator of the session.
    pub fn generators(&self) -> impl Iterator<Item = &GeneratorPackage> {
        self.generators.iter()
    }

    /// Run the generator's splitter and create its generated records.
    pub fn try_generate_list(&mut self, id: GeneratorId) -> bool {
        let sub_path = self.context.config.generated_sub_path.clone();
        let generator = &mut self.generators[id.index()];
        let ok = generator.try_generate_list(&mut self.store, &sub_path);
        if !ok {
            generator.mark_broken();
        }
        ok
    }

    /// Report the first successful save of a generated record.
    pub fn set_generated_saved(&mut self, record: RecordId) -> bool {
        let Some(generator) = self.record(record).generated_by() else {
            return false;
        };
        self.generators[generator.index()].set_generated_saved(record)
    }

    /// Clear every generated-record link of a generator on both sides.
    pub fn unlink_generated(&mut self, id: GeneratorId) {
        self.generators[id.index()].unlink_all(&mut self.store);
    }

    /// Post-collection hook: while the owner is in Save with generation
    /// incomplete, the owner and split object must still resolve; once the
    /// owner has left Save its package should be gone unless the splitter keeps
    /// it alive on purpose.
    pub fn validate_after_garbage_collect(&mut self) -> GcValidation {
        let mut report = GcValidation::default();
        for generator in &mut self.generators {
            if generator.is_broken() {
                continue;
            }
            let owner = &self.store.records[generator.owner().index()];
            if owner.state() == PackageState::Save {
                if !generator.is_complete() && !(generator.owner_package_alive() && generator.split_object_alive()) {
                    error!(
                        splitter = generator.policy().name(),
                        owner = owner.package_name(),
                        "owner package or split object was garbage collected during generation; generation is broken"
                    );
                    generator.mark_broken();
                    report.errors += 1;
                }
            } else if generator.is_generated()
                && generator.owner_package_alive()
                && !generator.policy().use_internal_reference_to_avoid_garbage_collect()
                && generator.note_leak_reported()
            {
                warn!(
                    splitter = generator.policy().name(),
                    owner = owner.package_name(),
                    "owner package survived garbage collection after save; the splitter is leaking a reference"
                );
                report.warnings += 1;
            }
        }
        report
    }

    pub(crate) fn keep_alive_packages(&self) -> impl Iterator<Item = &Arc<LoadedPackage>> {
        self.generators.iter().filter_map(GeneratorPackage::keep_alive_package)
    }

    /// Walk the record's object cache from its save cursor, starting async
    /// builds for every requested platform not yet attempted. Returns false if
    /// the pending-build cap stopped the walk early.
    pub(crate) fn begin_cache_for_record(&mut self, id: RecordId, max_pending: usize) -> bool {
        let record = &mut self.store.records[id.index()];
        let requested = record.requested_platforms();
        let mut cursor = record.save_cursor;
        while cursor.object_index < record.object_cache.len() {
            let Some(object) = record.object_cache[cursor.object_index].upgrade() else {
                cursor.object_index += 1;
                cursor.platform_index = 0;
                continue;
            };
            while let Some(&platform) = requested.get(cursor.platform_index) {
                if !record.has_cooked_platform(platform, true) {
                    if self.pending.len() >= max_pending {
                        record.save_cursor = cursor;
                        return false;
                    }
                    object.begin_cache_for_platform(platform);
                    if !object.is_cached_platform_data_loaded(platform) {
                        self.pending.push(PendingAsyncBuild::new(record, &object, platform));
                    }
                }
                cursor.platform_index += 1;
            }
            cursor.object_index += 1;
            cursor.platform_index = 0;
        }
        record.save_cursor = cursor;
        true
    }

    /// Outstanding builds of `id` for `platform`.
    #[must_use]
    pub fn pending_builds_for(&self, id: RecordId, platform: PlatformId) -> usize {
        self.pending
            .iter()
            .filter(|b| b.owner() == id && b.platform() == platform)
            .count()
    }

    /// Outstanding builds across all records.
    #[must_use]
    pub fn pending_build_count(&self) -> usize {
        self.pending.len()
    }

    /// Live cancel managers.
    #[must_use]
    pub fn cancel_manager_count(&self) -> usize {
        self.cancels.len()
    }

    /// Poll every outstanding build and release the finished ones. Rate
    /// limited by `poll_interval_ms` unless `force` is set.
    pub fn poll_pending_builds(&mut self, force: bool) -> usize {
        if self.pending.is_empty() || !(force || self.throttle.ready(Instant::now())) {
            return 0;
        }
        let records = &mut self.store.records;
        let cancels = &mut self.cancels;
        let before = self.pending.len();
        self.pending.retain_mut(|build| {
            if !build.poll_is_complete() {
                return true;
            }
            build.release(&mut records[build.owner().index()], cancels);
            false
        });
        let completed = before - self.pending.len();
        if completed > 0 {
            debug!(completed, remaining = self.pending.len(), "async platform builds finished");
        }
        completed
    }

    /// Give every outstanding build of `owner` for `object` a shared cancel
    /// manager. Returns false if there were none.
    pub(crate) fn cancel_pending_for_object(&mut self, owner: RecordId, object: &Arc<dyn CookableObject>) -> bool {
        let count = self
            .pending
            .iter()
            .filter(|b| b.owner() == owner && !b.is_cancelled() && b.is_for_object(object))
            .count();
        if count == 0 {
            return false;
        }
        let manager = self.cancels.create(object, u32::try_from(count).unwrap_or(u32::MAX));
        for build in &mut self.pending {
            if build.owner() == owner && !build.is_cancelled() && build.is_for_object(object) {
                build.attach_cancel_manager(manager);
            }
        }
        true
    }

    /// Release every outstanding build regardless of completion.
    pub fn release_all_pending_builds(&mut self) -> usize {
        let released = self.pending.len();
        for mut build in self.pending.drain(..) {
            build.release(&mut self.store.records[build.owner().index()], &mut self.cancels);
        }
        released
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("session_id", &self.context.session_id)
            .field("records", &self.store.records.len())
            .field("generators", &self.generators.len())
            .field("pending_builds", &self.pending.len())
            .finish_non_exhaustive()
    }
}

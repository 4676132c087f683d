//! Generator packages: one source package lazily producing many derived ones.

use std::sync::{Arc, Weak};

use tracing::{debug, error, info};

use crate::core::collaborators::{CookableObject, LoadedPackage};
use crate::core::error::CookError;
use crate::core::record::RecordId;
use crate::core::registry::RecordStore;

/// Index of a generator in the registry's generator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneratorId(pub(crate) u32);

impl GeneratorId {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One entry returned by a [`SplitPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStructSpec {
    /// Path relative to the owner's generated sub-path.
    pub relative_path: String,
    /// Packages the generated package depends on.
    pub dependencies: Vec<String>,
    /// Map/non-map decision. Must be set; `None` drops the entry.
    pub create_as_map: Option<bool>,
}

/// Pluggable package-splitting policy, one implementation per splitter kind.
pub trait SplitPolicy: Send + Sync {
    /// Splitter name, for diagnostics.
    fn name(&self) -> &str;

    /// Whether `object` is a split source this policy handles.
    fn should_split(&self, object: &dyn CookableObject) -> bool;

    /// Ordered list of packages to generate from `split_object`.
    fn get_generate_list(&self, owner: &LoadedPackage, split_object: &dyn CookableObject) -> Vec<GeneratedStructSpec>;

    /// Opt in to the generator holding the owner package and split object
    /// alive itself until generation completes.
    fn use_internal_reference_to_avoid_garbage_collect(&self) -> bool {
        false
    }
}

/// A generated package tracked by its generator.
#[derive(Debug, Clone)]
pub struct GeneratedEntry {
    relative_path: String,
    package_name: String,
    dependencies: Vec<String>,
    is_map: bool,
    record: Option<RecordId>,
    saved: bool,
}

impl GeneratedEntry {
    /// Path relative to the generated sub-path.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Full synthesized package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Whether the package is created as a map.
    #[must_use]
    pub const fn is_map(&self) -> bool {
        self.is_map
    }

    /// Linked generated record.
    #[must_use]
    pub const fn record(&self) -> Option<RecordId> {
        self.record
    }

    /// Whether the first successful save has been reported.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.saved
    }
}

struct KeepAlive {
    _owner: Arc<LoadedPackage>,
    _split_object: Arc<dyn CookableObject>,
}

/// Splitting bookkeeping owned by exactly one source record.
pub struct GeneratorPackage {
    id: GeneratorId,
    owner: RecordId,
    policy: Arc<dyn SplitPolicy>,
    owner_package: Weak<LoadedPackage>,
    split_object: Weak<dyn CookableObject>,
    keep_alive: Option<KeepAlive>,
    entries: Vec<GeneratedEntry>,
    generated: bool,
    broken: bool,
    leak_reported: bool,
    remaining_to_populate: usize,
}

impl GeneratorPackage {
    pub(crate) fn new(
        id: GeneratorId,
        owner: RecordId,
        policy: Arc<dyn SplitPolicy>,
        owner_package: &Arc<LoadedPackage>,
        split_object: &Arc<dyn CookableObject>,
    ) -> Self {
        let keep_alive = policy
            .use_internal_reference_to_avoid_garbage_collect()
            .then(|| KeepAlive {
                _owner: Arc::clone(owner_package),
                _split_object: Arc::clone(split_object),
            });
        Self {
            id,
            owner,
            policy,
            owner_package: Arc::downgrade(owner_package),
            split_object: Arc::downgrade(split_object),
            keep_alive,
            entries: Vec::new(),
            generated: false,
            broken: false,
            leak_reported: false,
            remaining_to_populate: 0,
        }
    }

    /// Arena identity.
    #[must_use]
    pub const fn id(&self) -> GeneratorId {
        self.id
    }

    /// Owning source record.
    #[must_use]
    pub const fn owner(&self) -> RecordId {
        self.owner
    }

    /// Splitter in charge of this generator.
    #[must_use]
    pub fn policy(&self) -> &dyn SplitPolicy {
        self.policy.as_ref()
    }

    /// Generated entries in splitter order.
    #[must_use]
    pub fn entries(&self) -> &[GeneratedEntry] {
        &self.entries
    }

    /// Whether the generate list has been produced.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether generation failed or its GC contract was violated.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Generated records not yet saved.
    #[must_use]
    pub const fn remaining_to_populate(&self) -> usize {
        self.remaining_to_populate
    }

    /// Generation ran and every generated record has been saved.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.generated && self.remaining_to_populate == 0
    }

    /// Whether the generator is keeping the owner alive itself.
    #[must_use]
    pub const fn holds_internal_reference(&self) -> bool {
        self.keep_alive.is_some()
    }

    pub(crate) fn owner_package_alive(&self) -> bool {
        self.owner_package.strong_count() > 0
    }

    pub(crate) fn split_object_alive(&self) -> bool {
        self.split_object.strong_count() > 0
    }

    pub(crate) fn mark_broken(&mut self) {
        self.broken = true;
        self.keep_alive = None;
    }

    /// Records a leak report. Returns false if one was already recorded.
    pub(crate) fn note_leak_reported(&mut self) -> bool {
        !std::mem::replace(&mut self.leak_reported, true)
    }

    pub(crate) fn keep_alive_package(&self) -> Option<&Arc<LoadedPackage>> {
        self.keep_alive.as_ref().map(|k| &k._owner)
    }

    /// Ask the splitter for its generate list and find-or-create one record per
    /// entry. On any resolution failure, duplicate name or on-disk collision
    /// nothing is created and false is returned.
    pub(crate) fn try_generate_list(&mut self, store: &mut RecordStore, generated_sub_path: &str) -> bool {
        let (Some(owner_package), Some(split_object)) = (self.owner_package.upgrade(), self.split_object.upgrade())
        else {
            error!(
                splitter = self.policy.name(),
                "owner package or split object was collected before generation"
            );
            self.mark_broken();
            return false;
        };
        let owner_name = store.record(self.owner).package_name().to_owned();
        let specs = self.policy.get_generate_list(&owner_package, split_object.as_ref());

        let mut planned: Vec<(GeneratedStructSpec, String, String, bool)> = Vec::with_capacity(specs.len());
        for spec in specs {
            let Some(is_map) = spec.create_as_map else {
                let err = CookError::MissingCreateAsMap {
                    splitter: self.policy.name().to_owned(),
                    relative_path: spec.relative_path.clone(),
                };
                error!("{err}; entry skipped");
                continue;
            };
            let package_name = generated_package_name(&owner_name, generated_sub_path, &spec.relative_path);
            if planned.iter().any(|(_, planned_name, _, _)| *planned_name == package_name) {
                let err = CookError::DuplicateGeneratedPackage {
                    splitter: self.policy.name().to_owned(),
                    package: package_name,
                };
                error!(owner = %owner_name, "generation failed: {err}");
                return false;
            }
            match store.plan_generated_record(&package_name) {
                Ok(file_name) => planned.push((spec, package_name, file_name, is_map)),
                Err(err) => {
                    error!(splitter = self.policy.name(), owner = %owner_name, "generation failed: {err}");
                    return false;
                }
            }
        }

        let mut entries = Vec::with_capacity(planned.len());
        for (spec, package_name, file_name, is_map) in planned {
            let id = match store.find_or_add_by_names(&package_name, &file_name) {
                Ok(id) => id,
                Err(err) => {
                    error!(splitter = self.policy.name(), owner = %owner_name, "generation failed: {err}");
                    for entry in &entries {
                        Self::unlink_entry(entry, store);
                    }
                    return false;
                }
            };
            let record = store.record_mut(id);
            if let Some(other) = record.generated_by {
                assert_eq!(other, self.id, "{package_name} already generated by another generator");
            }
            record.generated_by = Some(self.id);
            debug!(package = %package_name, is_map, "linked generated package");
            entries.push(GeneratedEntry {
                relative_path: spec.relative_path,
                package_name,
                dependencies: spec.dependencies,
                is_map,
                record: Some(id),
                saved: false,
            });
        }

        info!(
            splitter = self.policy.name(),
            owner = %owner_name,
            count = entries.len(),
            "generated package list"
        );
        self.remaining_to_populate = entries.len();
        self.entries = entries;
        self.generated = true;
        if self.is_complete() {
            self.keep_alive = None;
        }
        true
    }

    /// Report the first successful save of a generated record. Idempotent.
    /// Returns true if the outstanding counter moved.
    pub fn set_generated_saved(&mut self, record: RecordId) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.record == Some(record)) else {
            debug!(%record, "saved record is not linked to this generator");
            return false;
        };
        if entry.saved {
            return false;
        }
        entry.saved = true;
        assert!(
            self.remaining_to_populate > 0,
            "generator remaining-to-populate counter would go negative"
        );
        self.remaining_to_populate -= 1;
        if self.is_complete() {
            self.keep_alive = None;
        }
        true
    }

    /// Clear both sides of every generated link.
    pub(crate) fn unlink_all(&mut self, store: &mut RecordStore) {
        for entry in &mut self.entries {
            Self::unlink_entry(entry, store);
            entry.record = None;
        }
    }

    fn unlink_entry(entry: &GeneratedEntry, store: &mut RecordStore) {
        if let Some(id) = entry.record {
            store.record_mut(id).generated_by = None;
        }
    }
}

impl std::fmt::Debug for GeneratorPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorPackage")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("policy", &self.policy.name())
            .field("entries", &self.entries.len())
            .field("generated", &self.generated)
            .field("broken", &self.broken)
            .field("remaining_to_populate", &self.remaining_to_populate)
            .finish_non_exhaustive()
    }
}

/// Join owner, reserved sub-path and relative path into a package name.
#[must_use]
pub fn generated_package_name(owner: &str, sub_path: &str, relative_path: &str) -> String {
    format!(
        "{}/{}/{}",
        owner.trim_end_matches('/'),
        sub_path.trim_matches('/'),
        relative_path.trim_start_matches('/')
    )
}

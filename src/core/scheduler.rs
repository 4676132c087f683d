//! Single-threaded cooperative driver of the cook pipeline.
//!
//! Every state change goes through [`Scheduler::send_to_state`]: leave the old
//! queue, run the old state's exit hook, tear down the properties the new
//! state lacks (most dependent first), set up the ones it gains (least
//! dependent first), then enqueue and notify the monitor.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::collaborators::{CookDriver, CookableObject, DependencyExplorer, ExploreOutcome, LoadedPackage, PreloadProvider};
use crate::core::generator::{GeneratorId, SplitPolicy};
use crate::core::monitor::Monitor;
use crate::core::record::{CompletionCallback, CookedTransition, Instigator, PackageRecord, PlatformId, RecordId, SaveCursor};
use crate::core::registry::{GcValidation, Registry};
use crate::core::state::{PackageState, SendFlags, StateProperties};
use crate::infra::queue::StageQueues;
use crate::util::clock::PollThrottle;
use crate::util::telemetry::session_span;

/// Work done by one [`Scheduler::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    /// Async builds found complete and released.
    pub builds_completed: usize,
    /// Records moved out of the unclustered set.
    pub clustered: usize,
    /// Records admitted from Request to LoadPrepare.
    pub admitted: usize,
    /// Records whose preload finished.
    pub preloads_finished: usize,
    /// Records loaded into Save.
    pub loaded: usize,
    /// Platform results committed.
    pub committed: usize,
    /// Records that finished Save and returned to Idle.
    pub completed: usize,
}

impl TickStats {
    /// Whether the tick changed anything.
    #[must_use]
    pub const fn made_progress(&self) -> bool {
        self.builds_completed
            + self.clustered
            + self.admitted
            + self.preloads_finished
            + self.loaded
            + self.committed
            + self.completed
            > 0
    }
}

enum SaveStep {
    Pending { committed: usize },
    Done,
}

/// The cook pipeline scheduler.
pub struct Scheduler {
    registry: Registry,
    queues: StageQueues,
    monitor: Monitor,
    preload: Box<dyn PreloadProvider>,
    driver: Box<dyn CookDriver>,
    explorer: Box<dyn DependencyExplorer>,
    splitters: Vec<Arc<dyn SplitPolicy>>,
    preload_throttle: PollThrottle,
    span: tracing::Span,
    shut_down: bool,
}

impl Scheduler {
    /// Assemble a scheduler around a registry and its collaborators.
    pub fn new(
        registry: Registry,
        preload: Box<dyn PreloadProvider>,
        driver: Box<dyn CookDriver>,
        explorer: Box<dyn DependencyExplorer>,
    ) -> Self {
        let interval = Duration::from_millis(registry.config().poll_interval_ms);
        let span = session_span(registry.context().session_id);
        span.in_scope(|| info!("cook scheduler started"));
        Self {
            registry,
            queues: StageQueues::new(),
            monitor: Monitor::new(),
            preload,
            driver,
            explorer,
            splitters: Vec::new(),
            preload_throttle: PollThrottle::new(interval),
            span,
            shut_down: false,
        }
    }

    /// Register a package-splitting policy.
    pub fn add_splitter(&mut self, policy: Arc<dyn SplitPolicy>) {
        self.splitters.push(policy);
    }

    /// Record registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry access, for identity operations such as rename.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Aggregate counters.
    #[must_use]
    pub const fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Stage queues.
    #[must_use]
    pub const fn queues(&self) -> &StageQueues {
        &self.queues
    }

    /// Record by id.
    #[must_use]
    pub fn record(&self, id: RecordId) -> &PackageRecord {
        self.registry.record(id)
    }

    /// Nothing in progress and no async build outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.monitor.in_progress_count() == 0 && self.registry.pending_build_count() == 0
    }

    // ---- requests -------------------------------------------------------

    /// Find or create the record for `package_name` and request `platforms`
    /// for it on behalf of the user. `None` if the package cannot be resolved.
    pub fn request_package(
        &mut self,
        package_name: &str,
        platforms: &[PlatformId],
        urgent: bool,
        callback: Option<CompletionCallback>,
    ) -> Option<RecordId> {
        let id = self.registry.find_or_add_by_package_name(package_name)?;
        self.update_request_data(id, platforms, urgent, callback, Instigator::user());
        Some(id)
    }

    /// Same as [`Self::request_package`], addressed by file name.
    pub fn request_file(
        &mut self,
        file_name: &str,
        platforms: &[PlatformId],
        urgent: bool,
        callback: Option<CompletionCallback>,
    ) -> Option<RecordId> {
        let id = self.registry.find_or_add_by_file_name(file_name)?;
        self.update_request_data(id, platforms, urgent, callback, Instigator::user());
        Some(id)
    }

    /// Merge a request into a record.
    ///
    /// An in-progress record is demoted to Request if any platform is new, or
    /// re-enqueued in place if only its urgency rose. An idle record needs a
    /// non-empty platform set and moves to Request. At most one callback may
    /// be pending per record.
    pub fn update_request_data(
        &mut self,
        id: RecordId,
        platforms: &[PlatformId],
        urgent: bool,
        callback: Option<CompletionCallback>,
        instigator: Instigator,
    ) {
        let record = self.registry.record_mut(id);
        if callback.is_some() {
            assert!(
                record.completion.is_none(),
                "{} already has a pending completion callback",
                record.package_name()
            );
            record.completion = callback;
        }

        if record.is_in_progress() {
            let added = record.add_requested_platforms(platforms);
            let raised = urgent && !record.urgent;
            if raised {
                self.set_urgency(id, true);
            }
            if added {
                self.send_to_state(id, PackageState::Request, SendFlags::QUEUE_ADD_AND_REMOVE);
            } else if raised {
                let state = self.registry.record(id).state();
                self.requeue(id, state);
            }
            return;
        }

        assert!(
            !platforms.is_empty(),
            "request for idle {} names no platform",
            record.package_name()
        );
        record.set_instigator_if_none(instigator);
        record.add_requested_platforms(platforms);
        if urgent {
            self.set_urgency(id, true);
        }
        self.send_to_state(id, PackageState::Request, SendFlags::QUEUE_ADD);
    }

    fn set_urgency(&mut self, id: RecordId, urgent: bool) {
        let record = self.registry.record_mut(id);
        if record.urgent == urgent {
            return;
        }
        record.urgent = urgent;
        self.monitor.on_urgency_changed(record.state(), urgent);
    }

    fn requeue(&mut self, id: RecordId, state: PackageState) {
        assert!(
            self.queues.remove(state, id),
            "{} missing from the {state} queue",
            self.registry.record(id).package_name()
        );
        self.queues.enqueue(state, self.registry.record(id));
    }

    /// Record a save attempt for `platform`.
    pub fn set_platform_cooked(&mut self, id: RecordId, platform: PlatformId, succeeded: bool) {
        if self.registry.record_mut(id).set_platform_cooked(platform, succeeded) == CookedTransition::FirstAdded {
            self.monitor.on_first_cooked_platform_added();
        }
    }

    /// Forget a save attempt for `platform`.
    pub fn set_platform_not_cooked(&mut self, id: RecordId, platform: PlatformId) {
        if self.registry.record_mut(id).set_platform_not_cooked(platform) == CookedTransition::LastRemoved {
            self.monitor.on_last_cooked_platform_removed();
        }
    }

    /// Abandon an in-progress record. Its callback fires.
    pub fn cancel(&mut self, id: RecordId) -> bool {
        if !self.registry.record(id).is_in_progress() {
            return false;
        }
        debug!(package = self.registry.record(id).package_name(), "cancelling request");
        self.send_to_state(id, PackageState::Idle, SendFlags::QUEUE_REMOVE);
        true
    }

    // ---- transitions ----------------------------------------------------

    /// Move `id` to `new`, running exit and enter hooks in dependency order.
    pub(crate) fn send_to_state(&mut self, id: RecordId, new: PackageState, flags: SendFlags) {
        let old = self.registry.record(id).state();
        if flags.contains(SendFlags::QUEUE_REMOVE) && old != PackageState::Idle {
            assert!(
                self.queues.remove(old, id),
                "{} missing from the {old} queue",
                self.registry.record(id).package_name()
            );
        }

        if old == PackageState::Save && new != PackageState::Save {
            self.on_exit_save(id);
        }

        let mut completion = None;
        for property in StateProperties::exited(old, new) {
            if property == StateProperties::HAS_PACKAGE {
                self.exit_has_package(id);
            } else if property == StateProperties::LOADING {
                self.exit_loading(id);
            } else if property == StateProperties::IN_PROGRESS {
                completion = self.exit_in_progress(id);
            }
        }
        for property in StateProperties::entered(old, new) {
            if property == StateProperties::IN_PROGRESS {
                self.monitor.on_in_progress_changed(true);
            } else if property == StateProperties::LOADING {
                let record = self.registry.record_mut(id);
                record.preload_attempted = false;
                record.preload_registered = false;
            }
        }

        let record = self.registry.record_mut(id);
        record.state = new;
        let urgent = record.urgent;
        if flags.contains(SendFlags::QUEUE_ADD) {
            self.queues.enqueue(new, self.registry.record(id));
        }
        self.monitor.on_state_changed(old, new, urgent);
        debug!(package = self.registry.record(id).package_name(), from = %old, to = %new, "state change");

        if let Some(callback) = completion {
            callback(self.registry.record(id));
        }
    }

    fn on_exit_save(&mut self, id: RecordId) {
        let objects: Vec<Arc<dyn CookableObject>> = self
            .registry
            .record(id)
            .object_cache
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for object in &objects {
            if !self.registry.cancel_pending_for_object(id, object) {
                self.driver
                    .release_cooked_platform_data(self.registry.record(id), object.as_ref());
            }
        }
        self.registry.record_mut(id).save_cursor = SaveCursor::default();
    }

    fn exit_has_package(&mut self, id: RecordId) {
        let record = self.registry.record_mut(id);
        record.package = None;
        record.object_cache.clear();
        record.object_cache_built = false;
        record.save_cursor = SaveCursor::default();
    }

    fn exit_loading(&mut self, id: RecordId) {
        let record = self.registry.record_mut(id);
        if record.preload_registered {
            self.preload.unregister_preloadable_archive(record.file_name());
            record.preload_registered = false;
        }
        record.preload = None;
        record.preload_attempted = false;
        if record.preload_allocated {
            record.preload_allocated = false;
            self.monitor.on_preload_allocated_changed(false);
        }
    }

    fn exit_in_progress(&mut self, id: RecordId) -> Option<CompletionCallback> {
        self.set_urgency(id, false);
        self.monitor.on_in_progress_changed(false);
        self.registry.record_mut(id).clear_in_progress_data()
    }

    // ---- stage pumps ----------------------------------------------------

    /// Run one pass of every stage, cheapest first.
    pub fn tick(&mut self) -> TickStats {
        let span = self.span.clone();
        let _entered = span.enter();
        let builds_completed = self.registry.poll_pending_builds(false);
        let clustered = self.pump_clustering();
        let admitted = self.pump_requests();
        let preloads_finished = self.pump_load_prepare();
        let loaded = self.pump_load_ready();
        let (committed, completed) = self.pump_saves();
        TickStats {
            builds_completed,
            clustered,
            admitted,
            preloads_finished,
            loaded,
            committed,
            completed,
        }
    }

    /// Tick until idle or `max_ticks` ticks have run. Returns whether the
    /// scheduler ended idle.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            if self.is_idle() {
                return true;
            }
            self.tick();
        }
        self.is_idle()
    }

    fn pump_clustering(&mut self) -> usize {
        let batch = self
            .queues
            .request
            .unclustered_batch(self.registry.config().cluster_batch_size);
        let mut clustered = 0;
        for id in batch {
            if !self.queues.request.is_unclustered(id) {
                continue;
            }
            let record = self.registry.record(id);
            let platforms = record.unexplored_requested_platforms();
            if !platforms.is_empty() {
                match self.explorer.explore(record, &platforms) {
                    ExploreOutcome::Deferred => continue,
                    ExploreOutcome::Explored { dependencies } => {
                        self.registry.record_mut(id).mark_platforms_explored(&platforms);
                        self.request_dependencies(id, &dependencies);
                    }
                }
            }
            // A dependency request may have demoted and re-queued this record.
            if self.queues.request.is_unclustered(id) && self.registry.record(id).are_requested_platforms_explored() {
                let urgent = self.registry.record(id).is_urgent();
                self.queues.request.mark_explored(id, urgent);
                clustered += 1;
            }
        }
        clustered
    }

    fn platforms_to_request(&self, id: RecordId, platforms: &[PlatformId]) -> Vec<PlatformId> {
        let record = self.registry.record(id);
        platforms
            .iter()
            .copied()
            .filter(|p| !record.has_cooked_platform(*p, true) && !record.platform(*p).is_some_and(|d| d.requested))
            .collect()
    }

    fn request_dependencies(&mut self, referencer: RecordId, dependencies: &[String]) {
        if dependencies.is_empty() {
            return;
        }
        let platforms = self.registry.record(referencer).requested_platforms();
        let referencer_name = self.registry.record(referencer).package_name().to_owned();
        for dependency in dependencies {
            let Some(dep) = self.registry.find_or_add_by_package_name(dependency) else {
                continue;
            };
            if dep == referencer {
                continue;
            }
            let needed = self.platforms_to_request(dep, &platforms);
            if !needed.is_empty() {
                self.update_request_data(dep, &needed, false, None, Instigator::dependency(referencer_name.as_str()));
            }
        }
    }

    fn pump_requests(&mut self) -> usize {
        let mut admitted = 0;
        while let Some(id) = self.queues.request.pop_ready() {
            if self.registry.record(id).platforms_needing_cook().is_empty() {
                debug!(package = self.registry.record(id).package_name(), "already cooked for every requested platform");
                self.send_to_state(id, PackageState::Idle, SendFlags::empty());
                continue;
            }
            self.send_to_state(id, PackageState::LoadPrepare, SendFlags::QUEUE_ADD);
            admitted += 1;
        }
        admitted
    }

    fn pump_load_prepare(&mut self) -> usize {
        let mut finished = 0;
        let poll = self.preload_throttle.ready(Instant::now());
        for id in self.queues.load_prepare.preloading() {
            let urgent = self.registry.record(id).is_urgent();
            let started = self.registry.record(id).preload_attempted;
            if (poll || urgent || !started) && self.advance_preload(id) {
                self.send_to_state(id, PackageState::LoadReady, SendFlags::QUEUE_ADD_AND_REMOVE);
                finished += 1;
            }
        }

        let limit = self.registry.config().max_preloads_in_flight;
        while self.monitor.preload_allocated_count() < limit {
            let Some(id) = self.queues.load_prepare.pop_entry() else {
                break;
            };
            if self.advance_preload(id) {
                self.send_to_state(id, PackageState::LoadReady, SendFlags::QUEUE_ADD);
                finished += 1;
            } else {
                self.queues.load_prepare.push_preloading(id);
            }
        }
        finished
    }

    fn start_preload(&mut self, id: RecordId) {
        let record = self.registry.record_mut(id);
        record.preload_attempted = true;
        match self.preload.open_read_package(record.file_name()) {
            Some(handle) => {
                record.preload = Some(handle);
                record.preload_allocated = true;
                self.monitor.on_preload_allocated_changed(true);
            }
            None => {
                warn!(package = record.package_name(), "could not open package for preload; loading without it");
            }
        }
    }

    /// Start the record's preload if needed and poll it. Returns true once it
    /// finished or there is nothing to wait for.
    fn advance_preload(&mut self, id: RecordId) -> bool {
        if !self.registry.record(id).preload_attempted {
            self.start_preload(id);
        }
        let allow_sync = self.registry.config().allow_urgent_sync_preload;
        let record = self.registry.record_mut(id);
        let Some(mut handle) = record.preload.take() else {
            return true;
        };
        if !handle.poll_is_complete() {
            if !(record.urgent && allow_sync) {
                record.preload = Some(handle);
                return false;
            }
            debug!(package = record.package_name(), "urgent package waiting on its preload");
            handle.wait_until_complete();
        }
        if !record.preload_registered {
            record.preload_registered = self
                .preload
                .try_register_preloadable_archive(record.file_name(), handle.as_ref());
            if !record.preload_registered {
                warn!(package = record.package_name(), "preload registration refused; loading without it");
            }
        }
        record.preload = Some(handle);
        true
    }

    fn pump_load_ready(&mut self) -> usize {
        let mut loaded = 0;
        while let Some(id) = self.queues.load_ready.pop_front() {
            match self.driver.load_package(self.registry.record(id)) {
                Some(package) => {
                    self.registry.record_mut(id).package = Some(package);
                    self.send_to_state(id, PackageState::Save, SendFlags::QUEUE_ADD);
                    loaded += 1;
                }
                None => {
                    warn!(package = self.registry.record(id).package_name(), "package failed to load");
                    for platform in self.registry.record(id).platforms_needing_cook() {
                        self.set_platform_cooked(id, platform, false);
                    }
                    self.send_to_state(id, PackageState::Idle, SendFlags::empty());
                }
            }
        }
        loaded
    }

    fn pump_saves(&mut self) -> (usize, usize) {
        let (mut committed, mut completed) = (0, 0);
        let ids: Vec<RecordId> = self.queues.save.iter().collect();
        for id in ids {
            if self.registry.record(id).state() != PackageState::Save {
                continue;
            }
            match self.save_step(id) {
                SaveStep::Pending { committed: n } => committed += n,
                SaveStep::Done => {
                    info!(package = self.registry.record(id).package_name(), "package cooked");
                    self.send_to_state(id, PackageState::Idle, SendFlags::QUEUE_REMOVE);
                    completed += 1;
                }
            }
        }
        (committed, completed)
    }

    fn save_step(&mut self, id: RecordId) -> SaveStep {
        if !self.registry.record(id).object_cache_built {
            self.build_object_cache(id);
        }
        if let Some(generator) = self.registry.record(id).generator() {
            let state = self.registry.generator(generator);
            let listed = if state.is_broken() {
                false
            } else {
                state.is_generated() || self.registry.try_generate_list(generator)
            };
            // Repeated on every Save visit; already requested platforms are filtered.
            if listed {
                self.request_generated(id, generator);
            }
        }

        let max_pending = self.registry.config().max_pending_async_builds;
        let walked = self.registry.begin_cache_for_record(id, max_pending);
        let needing = self.registry.record(id).platforms_needing_cook();
        if walked && needing.is_empty() && self.registry.record(id).pending_async_builds() == 0 {
            return SaveStep::Done;
        }

        let mut committed = 0;
        if walked {
            for platform in needing {
                if self.registry.pending_builds_for(id, platform) == 0 {
                    self.commit_platform(id, platform);
                    committed += 1;
                }
            }
        }
        SaveStep::Pending { committed }
    }

    fn build_object_cache(&mut self, id: RecordId) {
        let record = self.registry.record_mut(id);
        record.object_cache_built = true;
        let Some(package) = record.package.clone() else {
            return;
        };
        record.object_cache = package.objects().iter().map(Arc::downgrade).collect();
        if record.generator.is_some() || record.is_generated() {
            return;
        }
        let split = package.objects().iter().find_map(|object| {
            self.splitters
                .iter()
                .find(|policy| policy.should_split(object.as_ref()))
                .map(|policy| (Arc::clone(policy), object))
        });
        if let Some((policy, object)) = split {
            match self.registry.create_generator(id, policy, &package, object) {
                Ok(generator) => debug!(package = package.name(), ?generator, "package will be split"),
                Err(err) => warn!(package = package.name(), "cannot create generator: {err}"),
            }
        }
    }

    fn request_generated(&mut self, owner: RecordId, generator: GeneratorId) {
        let record = self.registry.record(owner);
        let (urgent, platforms) = (record.is_urgent(), record.requested_platforms());
        let owner_name = record.package_name().to_owned();
        let entries: Vec<(RecordId, Vec<String>)> = self
            .registry
            .generator(generator)
            .entries()
            .iter()
            .filter_map(|entry| entry.record().map(|id| (id, entry.dependencies().to_vec())))
            .collect();
        for (id, dependencies) in entries {
            self.registry.record_mut(id).mark_platforms_explored(&platforms);
            let needed = self.platforms_to_request(id, &platforms);
            if !needed.is_empty() {
                self.update_request_data(id, &needed, urgent, None, Instigator::generated(owner_name.as_str()));
            }
            self.request_dependencies(id, &dependencies);
        }
    }

    fn commit_platform(&mut self, id: RecordId, platform: PlatformId) {
        let record = self.registry.record(id);
        let succeeded = record
            .package()
            .is_some_and(|package| self.driver.save_package(record, package, platform));
        if succeeded {
            debug!(package = record.package_name(), %platform, "saved");
        } else {
            warn!(package = record.package_name(), %platform, "save failed");
        }
        self.set_platform_cooked(id, platform, succeeded);
        if succeeded && self.registry.record(id).is_generated() {
            self.registry.set_generated_saved(id);
        }
    }

    // ---- session-wide operations ----------------------------------------

    /// Rekey every record's platforms. Records at LoadPrepare or later whose
    /// platform order changed go back to Request.
    pub fn remap_target_platforms(&mut self, remap: &HashMap<PlatformId, PlatformId>) -> usize {
        let ids: Vec<RecordId> = self.registry.records().map(PackageRecord::id).collect();
        let mut demoted = 0;
        for id in ids {
            let reordered = self.registry.record_mut(id).remap_platforms(remap);
            let state = self.registry.record(id).state();
            if reordered && state >= PackageState::LoadPrepare {
                debug!(package = self.registry.record(id).package_name(), %state, "platform order changed; demoting");
                self.send_to_state(id, PackageState::Request, SendFlags::QUEUE_ADD_AND_REMOVE);
                demoted += 1;
            }
        }
        demoted
    }

    /// Hook to run after every external garbage-collection pass.
    pub fn post_garbage_collect(&mut self) -> GcValidation {
        self.registry.validate_after_garbage_collect()
    }

    /// Packages the scheduler needs kept alive: those held by in-progress
    /// records and those a generator keeps itself.
    #[must_use]
    pub fn referenced_packages(&self) -> Vec<Arc<LoadedPackage>> {
        let mut packages: Vec<Arc<LoadedPackage>> = self
            .registry
            .records()
            .filter_map(|record| record.package().cloned())
            .collect();
        for package in self.registry.keep_alive_packages() {
            if !packages.iter().any(|p| Arc::ptr_eq(p, package)) {
                packages.push(Arc::clone(package));
            }
        }
        packages
    }

    /// Recompute queue membership, monitor counters and generator links from
    /// the records and report the first mismatch.
    pub fn validate(&self) -> Result<(), String> {
        let mut in_progress = 0;
        let mut preload_allocated = 0;
        let mut cooked = 0;
        let mut pending = 0usize;
        let mut per_state = [0usize; PackageState::COUNT];
        let mut urgent = [0usize; PackageState::COUNT];

        for record in self.registry.records() {
            let (id, state) = (record.id(), record.state());
            for other in PackageState::ALL {
                if self.queues.contains(other, id) != (other == state) {
                    return Err(format!(
                        "{} is in state {state} but queue membership of {other} disagrees",
                        record.package_name()
                    ));
                }
            }
            per_state[state.index()] += 1;
            in_progress += usize::from(record.is_in_progress());
            preload_allocated += usize::from(record.is_preload_allocated());
            cooked += usize::from(record.has_any_cooked_platform());
            urgent[state.index()] += usize::from(record.is_urgent());
            pending += record.pending_async_builds() as usize;

            if let Some(generator) = record.generated_by() {
                let linked = self
                    .registry
                    .generator(generator)
                    .entries()
                    .iter()
                    .any(|e| e.record() == Some(id));
                if !linked {
                    return Err(format!("{} points at a generator that does not list it", record.package_name()));
                }
            }
        }

        for state in PackageState::ALL.into_iter().skip(1) {
            if self.queues.len(state) != per_state[state.index()] {
                return Err(format!("{state} queue holds records in other states"));
            }
        }
        for generator in self.registry.generators() {
            for entry in generator.entries() {
                if let Some(id) = entry.record() {
                    if self.registry.record(id).generated_by() != Some(generator.id()) {
                        return Err(format!("{} lost its generator back-reference", entry.package_name()));
                    }
                }
            }
        }

        let monitor = &self.monitor;
        if monitor.in_progress_count() != in_progress {
            return Err(format!("in-progress counter {} != {in_progress}", monitor.in_progress_count()));
        }
        if monitor.preload_allocated_count() != preload_allocated {
            return Err(format!(
                "preload-allocated counter {} != {preload_allocated}",
                monitor.preload_allocated_count()
            ));
        }
        if monitor.cooked_count() != cooked {
            return Err(format!("cooked counter {} != {cooked}", monitor.cooked_count()));
        }
        for state in PackageState::ALL {
            if monitor.urgent_count(state) != urgent[state.index()] {
                return Err(format!(
                    "urgent counter for {state} {} != {}",
                    monitor.urgent_count(state),
                    urgent[state.index()]
                ));
            }
        }
        if pending != self.registry.pending_build_count() {
            return Err(format!(
                "records count {pending} pending builds but {} are tracked",
                self.registry.pending_build_count()
            ));
        }
        Ok(())
    }

    /// Cancel every in-progress record and release every outstanding build.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let span = self.span.clone();
        let _entered = span.enter();
        let in_progress: Vec<RecordId> = self
            .registry
            .records()
            .filter(|r| r.is_in_progress())
            .map(PackageRecord::id)
            .collect();
        for id in &in_progress {
            self.send_to_state(*id, PackageState::Idle, SendFlags::QUEUE_REMOVE);
        }
        let released = self.registry.release_all_pending_builds();
        info!(
            cancelled = in_progress.len(),
            released,
            monitor = ?self.monitor.snapshot(),
            "cook scheduler shut down"
        );
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("monitor", &self.monitor)
            .field("splitters", &self.splitters.len())
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

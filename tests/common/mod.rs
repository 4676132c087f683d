//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use prometheus_cook_scheduler::builders::SchedulerBuilder;
use prometheus_cook_scheduler::config::SchedulerConfig;
use prometheus_cook_scheduler::core::{
    CompletionCallback, CookDriver, CookableObject, DependencyExplorer, ExploreOutcome, GeneratedStructSpec,
    LoadedPackage, PackageRecord, PackageState, PlatformId, Scheduler, SplitPolicy,
};
use prometheus_cook_scheduler::infra::{InMemoryContentStore, InMemoryPreloadProvider};
use prometheus_cook_scheduler::util::telemetry::init_tracing;

pub const X: PlatformId = PlatformId(1);
pub const Y: PlatformId = PlatformId(2);

/// Object whose platform data is ready immediately, or only after `finish`.
pub struct TestObject {
    name: String,
    auto_ready: bool,
    ready: Mutex<HashSet<PlatformId>>,
    pub begun: AtomicUsize,
    pub clears: AtomicUsize,
}

impl TestObject {
    pub fn ready(name: &str) -> Arc<Self> {
        Arc::new(Self::with(name, true))
    }

    pub fn slow(name: &str) -> Arc<Self> {
        Arc::new(Self::with(name, false))
    }

    fn with(name: &str, auto_ready: bool) -> Self {
        Self {
            name: name.to_owned(),
            auto_ready,
            ready: Mutex::new(HashSet::new()),
            begun: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn finish(&self, platform: PlatformId) {
        self.ready.lock().insert(platform);
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CookableObject for TestObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_cache_for_platform(&self, platform: PlatformId) {
        self.begun.fetch_add(1, Ordering::SeqCst);
        if self.auto_ready {
            self.ready.lock().insert(platform);
        }
    }

    fn is_cached_platform_data_loaded(&self, platform: PlatformId) -> bool {
        self.ready.lock().contains(&platform)
    }

    fn clear_all_cached_platform_data(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct DriverLog {
    pub objects: HashMap<String, Vec<Arc<dyn CookableObject>>>,
    pub failing_loads: HashSet<String>,
    pub failing_saves: HashSet<String>,
    pub retain_packages: bool,
    pub retained: Vec<Arc<LoadedPackage>>,
    pub loads: Vec<(String, PackageState)>,
    pub saves: Vec<(String, PlatformId, PackageState)>,
    pub released: usize,
}

/// Driver that loads packages from a table of objects and logs every call.
#[derive(Clone, Default)]
pub struct TestDriver {
    pub log: Arc<Mutex<DriverLog>>,
}

impl TestDriver {
    pub fn set_objects(&self, package: &str, objects: Vec<Arc<dyn CookableObject>>) {
        self.log.lock().objects.insert(package.to_owned(), objects);
    }

    pub fn fail_load(&self, package: &str) {
        self.log.lock().failing_loads.insert(package.to_owned());
    }

    pub fn fail_save(&self, package: &str) {
        self.log.lock().failing_saves.insert(package.to_owned());
    }

    pub fn retain_packages(&self) {
        self.log.lock().retain_packages = true;
    }

    pub fn load_count(&self, package: &str) -> usize {
        self.log.lock().loads.iter().filter(|(p, _)| p == package).count()
    }

    pub fn load_order(&self) -> Vec<String> {
        self.log.lock().loads.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn saves_of(&self, package: &str) -> Vec<PlatformId> {
        self.log
            .lock()
            .saves
            .iter()
            .filter(|(p, _, _)| p == package)
            .map(|(_, platform, _)| *platform)
            .collect()
    }
}

impl CookDriver for TestDriver {
    fn load_package(&mut self, record: &PackageRecord) -> Option<Arc<LoadedPackage>> {
        let mut log = self.log.lock();
        log.loads.push((record.package_name().to_owned(), record.state()));
        if log.failing_loads.contains(record.package_name()) {
            return None;
        }
        let objects = log.objects.get(record.package_name()).cloned().unwrap_or_else(|| {
            let default: Arc<dyn CookableObject> = TestObject::ready(&format!("{}.Asset", record.package_name()));
            vec![default]
        });
        let package = Arc::new(LoadedPackage::new(record.package_name(), objects));
        if log.retain_packages {
            log.retained.push(Arc::clone(&package));
        }
        Some(package)
    }

    fn save_package(&mut self, record: &PackageRecord, _package: &LoadedPackage, platform: PlatformId) -> bool {
        let mut log = self.log.lock();
        log.saves.push((record.package_name().to_owned(), platform, record.state()));
        !log.failing_saves.contains(record.package_name())
    }

    fn release_cooked_platform_data(&mut self, _record: &PackageRecord, object: &dyn CookableObject) {
        self.log.lock().released += 1;
        object.clear_all_cached_platform_data();
    }
}

#[derive(Default)]
pub struct ExplorerLog {
    pub dependencies: HashMap<String, Vec<String>>,
    pub defer_remaining: HashMap<String, usize>,
    pub calls: Vec<(String, Vec<PlatformId>, PackageState)>,
}

/// Explorer returning a fixed dependency table.
#[derive(Clone, Default)]
pub struct TestExplorer {
    pub log: Arc<Mutex<ExplorerLog>>,
}

impl TestExplorer {
    pub fn set_dependencies(&self, package: &str, dependencies: &[&str]) {
        self.log.lock().dependencies.insert(
            package.to_owned(),
            dependencies.iter().map(|d| (*d).to_owned()).collect(),
        );
    }

    pub fn defer(&self, package: &str, times: usize) {
        self.log.lock().defer_remaining.insert(package.to_owned(), times);
    }

    pub fn calls_for(&self, package: &str) -> Vec<Vec<PlatformId>> {
        self.log
            .lock()
            .calls
            .iter()
            .filter(|(p, _, _)| p == package)
            .map(|(_, platforms, _)| platforms.clone())
            .collect()
    }
}

impl DependencyExplorer for TestExplorer {
    fn explore(&mut self, record: &PackageRecord, platforms: &[PlatformId]) -> ExploreOutcome {
        let mut log = self.log.lock();
        let name = record.package_name().to_owned();
        log.calls.push((name.clone(), platforms.to_vec(), record.state()));
        if let Some(remaining) = log.defer_remaining.get_mut(&name) {
            if *remaining > 0 {
                *remaining -= 1;
                return ExploreOutcome::Deferred;
            }
        }
        ExploreOutcome::Explored {
            dependencies: log.dependencies.get(&name).cloned().unwrap_or_default(),
        }
    }
}

/// Splits any object whose name ends with `.World` into fixed cells.
pub struct CellSplitter {
    pub cells: Vec<(String, Option<bool>)>,
    pub dependencies: Vec<String>,
    pub keep_alive: bool,
}

impl CellSplitter {
    pub fn new(cells: &[&str]) -> Self {
        Self {
            cells: cells.iter().map(|c| ((*c).to_owned(), Some(false))).collect(),
            dependencies: Vec::new(),
            keep_alive: false,
        }
    }
}

impl SplitPolicy for CellSplitter {
    fn name(&self) -> &str {
        "cell-splitter"
    }

    fn should_split(&self, object: &dyn CookableObject) -> bool {
        object.name().ends_with(".World")
    }

    fn get_generate_list(&self, _owner: &LoadedPackage, _split: &dyn CookableObject) -> Vec<GeneratedStructSpec> {
        self.cells
            .iter()
            .map(|(path, is_map)| GeneratedStructSpec {
                relative_path: path.clone(),
                dependencies: self.dependencies.clone(),
                create_as_map: *is_map,
            })
            .collect()
    }

    fn use_internal_reference_to_avoid_garbage_collect(&self) -> bool {
        self.keep_alive
    }
}

/// Every collaborator of a scheduler, kept so tests can inspect them.
pub struct Harness {
    pub content: Arc<InMemoryContentStore>,
    pub preload: InMemoryPreloadProvider,
    pub driver: TestDriver,
    pub explorer: TestExplorer,
}

impl Harness {
    pub fn new(packages: &[&str]) -> Self {
        init_tracing();
        let content = Arc::new(InMemoryContentStore::new().with_mount("/Game/", "Content/"));
        for package in packages {
            content.add_package(package);
        }
        Self {
            content,
            preload: InMemoryPreloadProvider::new(),
            driver: TestDriver::default(),
            explorer: TestExplorer::default(),
        }
    }

    pub fn with_preload_latency(mut self, polls: u32) -> Self {
        self.preload = InMemoryPreloadProvider::new().with_poll_latency(polls);
        self
    }

    pub fn builder(&self) -> SchedulerBuilder {
        SchedulerBuilder::new()
            .with_config(fast_config())
            .with_resolver(self.content.clone())
            .with_preload_provider(self.preload.clone())
            .with_driver(self.driver.clone())
            .with_explorer(self.explorer.clone())
    }

    pub fn scheduler(&self) -> Scheduler {
        self.builder().build().unwrap()
    }
}

/// Defaults with polling on every tick.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_ms: 0,
        ..SchedulerConfig::default()
    }
}

/// Callback that counts its invocations and remembers the state it saw.
pub fn completion_probe() -> (Arc<Mutex<Vec<PackageState>>>, CompletionCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: CompletionCallback = Box::new(move |record: &PackageRecord| sink.lock().push(record.state()));
    (seen, callback)
}

pub fn counting_callback() -> (Arc<AtomicUsize>, CompletionCallback) {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let callback: CompletionCallback = Box::new(move |_record: &PackageRecord| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

//! Tests for builder modules

use std::sync::Arc;

use prometheus_cook_scheduler::builders::SchedulerBuilder;
use prometheus_cook_scheduler::config::SchedulerConfig;
use prometheus_cook_scheduler::core::{
    CookDriver, CookError, CookableObject, DependencyExplorer, ExploreOutcome, LoadedPackage, PackageRecord,
    PlatformId,
};
use prometheus_cook_scheduler::infra::{InMemoryContentStore, InMemoryPreloadProvider};

struct NoopDriver;

impl CookDriver for NoopDriver {
    fn load_package(&mut self, record: &PackageRecord) -> Option<Arc<LoadedPackage>> {
        Some(Arc::new(LoadedPackage::new(record.package_name(), Vec::new())))
    }

    fn save_package(&mut self, _record: &PackageRecord, _package: &LoadedPackage, _platform: PlatformId) -> bool {
        true
    }

    fn release_cooked_platform_data(&mut self, _record: &PackageRecord, _object: &dyn CookableObject) {}
}

struct NoDependencies;

impl DependencyExplorer for NoDependencies {
    fn explore(&mut self, _record: &PackageRecord, _platforms: &[PlatformId]) -> ExploreOutcome {
        ExploreOutcome::Explored {
            dependencies: Vec::new(),
        }
    }
}

fn complete_builder() -> SchedulerBuilder {
    SchedulerBuilder::new()
        .with_resolver(Arc::new(InMemoryContentStore::new().with_mount("/Game/", "Content/")))
        .with_preload_provider(InMemoryPreloadProvider::new())
        .with_driver(NoopDriver)
        .with_explorer(NoDependencies)
}

#[test]
fn test_scheduler_builder_defaults() {
    let scheduler = complete_builder().build().unwrap();
    assert_eq!(scheduler.registry().config(), &SchedulerConfig::default());
    assert!(scheduler.registry().is_empty());
    assert!(scheduler.is_idle());
}

#[test]
fn test_scheduler_builder_session_id() {
    let id = uuid::Uuid::new_v4();
    let scheduler = complete_builder().with_session_id(id).build().unwrap();
    assert_eq!(scheduler.registry().context().session_id, id);
}

#[test]
fn test_scheduler_builder_asset_index() {
    let store = Arc::new(InMemoryContentStore::new().with_mount("/Game/", "Content/"));
    let scheduler = complete_builder().with_asset_index(store).build().unwrap();
    assert!(scheduler.registry().context().asset_index.is_some());
}

#[test]
fn test_scheduler_builder_rejects_invalid_config() {
    let config = SchedulerConfig {
        cluster_batch_size: 0,
        ..SchedulerConfig::default()
    };
    let err = complete_builder().with_config(config).build().unwrap_err();
    assert!(matches!(err, CookError::InvalidConfig(_)));
}

#[test]
fn test_scheduler_builder_missing_components() {
    let err = SchedulerBuilder::new().build().unwrap_err();
    assert!(matches!(err, CookError::MissingComponent("name resolver")));

    let err = SchedulerBuilder::new()
        .with_resolver(Arc::new(InMemoryContentStore::new()))
        .with_preload_provider(InMemoryPreloadProvider::new())
        .with_explorer(NoDependencies)
        .build()
        .unwrap_err();
    assert!(matches!(err, CookError::MissingComponent("cook driver")));
}

#[test]
fn test_scheduler_builder_debug_lists_components() {
    let text = format!("{:?}", complete_builder());
    assert!(text.contains("driver: true"));
    assert!(text.contains("asset_index: false"));
}

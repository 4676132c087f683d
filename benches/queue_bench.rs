//! Benchmarks for the cook scheduler.
//!
//! Benchmarks cover:
//! - Stage queue operations (push/pop/lazy removal)
//! - Request queue clustering and tier selection
//! - Bulk identity lookups
//! - End-to-end cook of a flat package set

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use prometheus_cook_scheduler::builders::SchedulerBuilder;
use prometheus_cook_scheduler::config::SchedulerConfig;
use prometheus_cook_scheduler::core::{
    CookContext, CookDriver, CookableObject, DependencyExplorer, ExploreOutcome, LoadedPackage, NameResolver,
    PackageRecord, PlatformId, RecordId, Registry,
};
use prometheus_cook_scheduler::infra::queue::{RequestQueue, SaveQueue, TicketDeque};
use prometheus_cook_scheduler::infra::{InMemoryContentStore, InMemoryPreloadProvider};

// ============================================================================
// Helpers
// ============================================================================

fn content_store(size: u64) -> Arc<InMemoryContentStore> {
    let store = Arc::new(InMemoryContentStore::new().with_mount("/Game/", "Content/"));
    for i in 0..size {
        store.add_package(&format!("/Game/Bench/P{i}"));
    }
    store
}

/// Real record ids, allocated through a registry.
fn record_ids(size: u64) -> Vec<RecordId> {
    let store = content_store(size);
    let mut registry = Registry::new(store, CookContext::new(SchedulerConfig::default()));
    (0..size)
        .filter_map(|i| registry.find_or_add_by_package_name(&format!("/Game/Bench/P{i}")))
        .collect()
}

struct ReadyObject;

impl CookableObject for ReadyObject {
    fn name(&self) -> &str {
        "Bench.Asset"
    }

    fn begin_cache_for_platform(&self, _platform: PlatformId) {}

    fn is_cached_platform_data_loaded(&self, _platform: PlatformId) -> bool {
        true
    }

    fn clear_all_cached_platform_data(&self) {}
}

struct BenchDriver;

impl CookDriver for BenchDriver {
    fn load_package(&mut self, record: &PackageRecord) -> Option<Arc<LoadedPackage>> {
        let object: Arc<dyn CookableObject> = Arc::new(ReadyObject);
        Some(Arc::new(LoadedPackage::new(record.package_name(), vec![object])))
    }

    fn save_package(&mut self, _record: &PackageRecord, _package: &LoadedPackage, _platform: PlatformId) -> bool {
        true
    }
}

struct NoDependencies;

impl DependencyExplorer for NoDependencies {
    fn explore(&mut self, _record: &PackageRecord, _platforms: &[PlatformId]) -> ExploreOutcome {
        ExploreOutcome::Explored {
            dependencies: Vec::new(),
        }
    }
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_ticket_deque_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("ticket_deque_push_pop");

    for size in [100, 1_000, 10_000] {
        let ids = record_ids(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| {
                let mut q = TicketDeque::new();
                for (i, id) in ids.iter().enumerate() {
                    if i % 8 == 0 {
                        q.push_front(*id);
                    } else {
                        q.push_back(*id);
                    }
                }
                while let Some(id) = q.pop_front() {
                    black_box(id);
                }
            });
        });
    }
    group.finish();
}

fn bench_ticket_deque_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("ticket_deque_remove");

    for size in [100, 1_000, 10_000] {
        let ids = record_ids(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| {
                let mut q = TicketDeque::new();
                for id in ids {
                    q.push_back(*id);
                }
                // Lazy removal of every other record
                for id in ids.iter().step_by(2) {
                    black_box(q.remove(*id));
                }
                black_box(q.len());
            });
        });
    }
    group.finish();
}

fn bench_save_queue_urgent_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_queue_urgent_mix");

    for size in [100, 1_000, 5_000] {
        let ids = record_ids(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| {
                let mut q = SaveQueue::new();
                for (i, id) in ids.iter().enumerate() {
                    q.push(*id, i % 10 == 0);
                }
                let mut count = 0;
                while q.pop_front().is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    group.finish();
}

fn bench_request_queue_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_queue_clustering");

    for size in [100, 1_000, 5_000] {
        let ids = record_ids(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| {
                let mut q = RequestQueue::new();
                for id in ids {
                    q.add_request(*id, false, false);
                }
                loop {
                    let batch = q.unclustered_batch(64);
                    if batch.is_empty() {
                        break;
                    }
                    for (i, id) in batch.into_iter().enumerate() {
                        q.mark_explored(id, i % 4 == 0);
                    }
                }
                while let Some(id) = q.pop_ready() {
                    black_box(id);
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_registry_bulk_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_bulk_lookup");

    for size in [1_000, 10_000] {
        let store = content_store(size);
        let files: Vec<String> = (0..size)
            .filter_map(|i| store.mounted_file_name(&format!("/Game/Bench/P{i}")))
            .collect();
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("parallel", size), &files, |b, files| {
            b.iter(|| {
                let mut registry = Registry::new(store.clone(), CookContext::new(SchedulerConfig::default()));
                black_box(registry.find_or_add_by_file_names_parallel(files));
            });
        });
        group.bench_with_input(BenchmarkId::new("sequential", size), &files, |b, files| {
            b.iter(|| {
                let mut registry = Registry::new(store.clone(), CookContext::new(SchedulerConfig::default()));
                for file in files {
                    black_box(registry.find_or_add_by_file_name(file));
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// End-to-End Benchmarks
// ============================================================================

fn bench_cook_flat_package_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cook_flat_package_set");
    let platforms = [PlatformId(1), PlatformId(2)];

    for size in [50, 500] {
        let store = content_store(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let config = SchedulerConfig {
                    poll_interval_ms: 0,
                    ..SchedulerConfig::default()
                };
                let mut scheduler = SchedulerBuilder::new()
                    .with_config(config)
                    .with_resolver(store.clone())
                    .with_preload_provider(InMemoryPreloadProvider::new())
                    .with_driver(BenchDriver)
                    .with_explorer(NoDependencies)
                    .build()
                    .unwrap();
                for i in 0..size {
                    scheduler.request_package(&format!("/Game/Bench/P{i}"), &platforms, i % 16 == 0, None);
                }
                black_box(scheduler.run_until_idle(10_000));
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    queue_benches,
    bench_ticket_deque_push_pop,
    bench_ticket_deque_remove,
    bench_save_queue_urgent_mix,
    bench_request_queue_clustering
);

criterion_group!(registry_benches, bench_registry_bulk_lookup);

criterion_group!(scenario_benches, bench_cook_flat_package_set);

criterion_main!(queue_benches, registry_benches, scenario_benches);

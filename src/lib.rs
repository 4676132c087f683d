//! # Prometheus Cook Scheduler
//!
//! The scheduler at the heart of a content cooking pipeline. It turns a large,
//! mutually dependent set of named packages into per-platform artifacts, one
//! attempt per (package, platform), overlapping disk preloads, dependency
//! discovery and asynchronous per-object platform-data builds.
//!
//! ## Pipeline
//!
//! Every package has one [`core::PackageRecord`] for the whole session, moving
//! through `Idle → Request → LoadPrepare → LoadReady → Save → Idle`. Each stage
//! has its own queue in [`infra::queue`]; urgent records are serviced first in
//! every stage. Transitions are driven by a property table, so shared
//! capabilities (such as holding the loaded package across LoadReady and Save)
//! are not torn down between adjacent stages.
//!
//! ## Key Features
//!
//! - **Polled, never blocking**: preloads and platform-data builds are handles
//!   polled on a global minimum interval; only an urgent record may block on
//!   its own preload
//! - **Package splitting**: a [`core::SplitPolicy`] lets one package lazily
//!   produce and track many generated packages
//! - **Stable identity**: name and file maps with a parallel read phase and a
//!   single-writer merge for bulk creation
//! - **O(1) monitoring**: [`core::Monitor`] counters maintained incrementally
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_cook_scheduler::builders::SchedulerBuilder;
//! use prometheus_cook_scheduler::core::PlatformId;
//! use prometheus_cook_scheduler::infra::{InMemoryContentStore, InMemoryPreloadProvider};
//!
//! let content = Arc::new(InMemoryContentStore::new().with_mount("/Game/", "Content/"));
//! content.add_package("/Game/Maps/Arena");
//!
//! let mut scheduler = SchedulerBuilder::new()
//!     .with_resolver(content)
//!     .with_preload_provider(InMemoryPreloadProvider::new())
//!     .with_driver(my_driver)
//!     .with_explorer(my_explorer)
//!     .build()?;
//!
//! scheduler.request_package("/Game/Maps/Arena", &[PlatformId(0)], false, None);
//! scheduler.run_until_idle(1_000);
//! ```
//!
//! For complete scenarios, see `tests/pipeline_test.rs`.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pipeline: records, transitions, monitor, generators and the scheduler.
pub mod core;
/// Scheduler configuration.
pub mod config;
/// Builders to construct a scheduler from configuration and collaborators.
pub mod builders;
/// Stage queues and in-memory collaborators.
pub mod infra;
/// Shared utilities.
pub mod util;

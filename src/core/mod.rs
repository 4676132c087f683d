//! Core pipeline: records, transitions, monitor, generators and the scheduler.

pub mod async_build;
pub mod collaborators;
pub mod error;
pub mod generator;
pub mod monitor;
pub mod record;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use async_build::{CancelId, CancelManager, CancelManagers, PendingAsyncBuild};
pub use collaborators::{
    AssetIndex, CookDriver, CookableObject, DependencyExplorer, ExploreOutcome, LoadedPackage, NameResolver,
    PreloadHandle, PreloadProvider,
};
pub use error::{AppResult, CookError};
pub use generator::{generated_package_name, GeneratedEntry, GeneratedStructSpec, GeneratorId, GeneratorPackage, SplitPolicy};
pub use monitor::{Monitor, MonitorSnapshot};
pub use record::{
    CompletionCallback, CookedTransition, Instigator, InstigatorCategory, PackageRecord, PlatformData, PlatformId,
    RecordId,
};
pub use registry::{CookContext, GcValidation, Registry};
pub use scheduler::{Scheduler, TickStats};
pub use state::{PackageState, SendFlags, StateProperties};

//! Assemble a [`Scheduler`] from configuration and collaborators.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::collaborators::{AssetIndex, CookDriver, DependencyExplorer, NameResolver, PreloadProvider};
use crate::core::error::CookError;
use crate::core::generator::SplitPolicy;
use crate::core::registry::{CookContext, Registry};
use crate::core::scheduler::Scheduler;

/// Builder for a [`Scheduler`]. Resolver, preload provider, driver and explorer
/// are required.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    resolver: Option<Arc<dyn NameResolver>>,
    asset_index: Option<Arc<dyn AssetIndex>>,
    preload: Option<Box<dyn PreloadProvider>>,
    driver: Option<Box<dyn CookDriver>>,
    explorer: Option<Box<dyn DependencyExplorer>>,
    splitters: Vec<Arc<dyn SplitPolicy>>,
    session_id: Option<Uuid>,
}

impl SchedulerBuilder {
    /// Builder with default configuration and no collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler tuning.
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Name and file resolution.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Optional asset index consulted before the file system.
    #[must_use]
    pub fn with_asset_index(mut self, asset_index: Arc<dyn AssetIndex>) -> Self {
        self.asset_index = Some(asset_index);
        self
    }

    /// Source of package preloads.
    #[must_use]
    pub fn with_preload_provider(mut self, preload: impl PreloadProvider + 'static) -> Self {
        self.preload = Some(Box::new(preload));
        self
    }

    /// Load and save hooks.
    #[must_use]
    pub fn with_driver(mut self, driver: impl CookDriver + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Dependency explorer.
    #[must_use]
    pub fn with_explorer(mut self, explorer: impl DependencyExplorer + 'static) -> Self {
        self.explorer = Some(Box::new(explorer));
        self
    }

    /// Register a package-splitting policy.
    #[must_use]
    pub fn with_splitter(mut self, policy: Arc<dyn SplitPolicy>) -> Self {
        self.splitters.push(policy);
        self
    }

    /// Use a known session id instead of a fresh one.
    #[must_use]
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Validate the configuration and assemble the scheduler.
    pub fn build(self) -> Result<Scheduler, CookError> {
        self.config.validate().map_err(CookError::InvalidConfig)?;
        let resolver = self.resolver.ok_or(CookError::MissingComponent("name resolver"))?;
        let preload = self.preload.ok_or(CookError::MissingComponent("preload provider"))?;
        let driver = self.driver.ok_or(CookError::MissingComponent("cook driver"))?;
        let explorer = self.explorer.ok_or(CookError::MissingComponent("dependency explorer"))?;

        let mut context = CookContext::new(self.config);
        if let Some(session_id) = self.session_id {
            context.session_id = session_id;
        }
        context.asset_index = self.asset_index;

        let mut scheduler = Scheduler::new(Registry::new(resolver, context), preload, driver, explorer);
        for policy in self.splitters {
            scheduler.add_splitter(policy);
        }
        Ok(scheduler)
    }
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .field("asset_index", &self.asset_index.is_some())
            .field("preload", &self.preload.is_some())
            .field("driver", &self.driver.is_some())
            .field("explorer", &self.explorer.is_some())
            .field("splitters", &self.splitters.len())
            .finish()
    }
}

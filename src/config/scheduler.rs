//! Tuning knobs for one cook session.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;

/// Scheduler configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum interval between polls of outstanding async builds; 0 polls every tick.
    pub poll_interval_ms: u64,
    /// Reserved sub-path between an owner package and its generated packages.
    pub generated_sub_path: String,
    /// Whether an urgent record may block the driver on its own preload.
    pub allow_urgent_sync_preload: bool,
    /// Cap on records holding a preload slot. Urgent records bypass it.
    pub max_preloads_in_flight: usize,
    /// Cap on outstanding async builds across all records.
    pub max_pending_async_builds: usize,
    /// Unclustered records handed to the explorer per tick.
    pub cluster_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            generated_sub_path: "_Generated_".to_owned(),
            allow_urgent_sync_preload: true,
            max_preloads_in_flight: 32,
            max_pending_async_builds: 512,
            cluster_batch_size: 64,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.generated_sub_path.trim_matches('/').is_empty() {
            return Err("generated_sub_path must not be empty".into());
        }
        if self.max_preloads_in_flight == 0 {
            return Err("max_preloads_in_flight must be greater than 0".into());
        }
        if self.max_pending_async_builds == 0 {
            return Err("max_pending_async_builds must be greater than 0".into());
        }
        if self.cluster_batch_size == 0 {
            return Err("cluster_batch_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("reading scheduler config {}", path.display()))?;
        Self::from_json_str(&input)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading scheduler config {}", path.display()))
    }

    /// Defaults overridden by `COOK_*` environment variables, after loading a
    /// `.env` file if one is present.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `COOK_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            value
                .trim()
                .parse()
                .with_context(|| format!("invalid value `{value}` for {key}"))
        }

        let mut cfg = Self::default();
        if let Some(v) = lookup("COOK_POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = parse("COOK_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("COOK_GENERATED_SUB_PATH") {
            cfg.generated_sub_path = v;
        }
        if let Some(v) = lookup("COOK_ALLOW_URGENT_SYNC_PRELOAD") {
            cfg.allow_urgent_sync_preload = parse("COOK_ALLOW_URGENT_SYNC_PRELOAD", &v)?;
        }
        if let Some(v) = lookup("COOK_MAX_PRELOADS_IN_FLIGHT") {
            cfg.max_preloads_in_flight = parse("COOK_MAX_PRELOADS_IN_FLIGHT", &v)?;
        }
        if let Some(v) = lookup("COOK_MAX_PENDING_ASYNC_BUILDS") {
            cfg.max_pending_async_builds = parse("COOK_MAX_PENDING_ASYNC_BUILDS", &v)?;
        }
        if let Some(v) = lookup("COOK_CLUSTER_BATCH_SIZE") {
            cfg.cluster_batch_size = parse("COOK_CLUSTER_BATCH_SIZE", &v)?;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

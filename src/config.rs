// Copyright 2024-2026 fenced-pool Contributors
// Licensed under the Apache License, Version 2.0

//! Pool configuration: defaults, environment variables and TOML files.
//!
//! Invalid or missing values fall back to defaults without panicking, then
//! every config is normalized before a pool uses it.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FENCED_POOL_NAME` | `command_buffers` | Pool label in logs and metrics |
//! | `FENCED_POOL_INITIAL_COUNT` | 32 | Resources created up front |
//! | `FENCED_POOL_GROW_BY` | 1 | Resources created per on-demand growth |
//! | `FENCED_POOL_MAX_RESOURCES` | 1024 | Upper bound on live resources |
//! | `FENCED_POOL_DRAIN_TIMEOUT_MS` | 5000 | Teardown fence wait budget (ms) |

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Warm-set size for command buffer pools.
pub const DEFAULT_INITIAL_COUNT: usize = 32;
pub const DEFAULT_GROW_BY: usize = 1;
pub const DEFAULT_MAX_RESOURCES: usize = 1024;
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POOL_NAME: &str = "command_buffers";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid pool config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How a pool grows once its free list runs dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    /// Resources created per growth step.
    pub grow_by: usize,
    /// Acquire fails with `Exhausted` once this many resources are live.
    pub max_resources: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            grow_by: DEFAULT_GROW_BY,
            max_resources: DEFAULT_MAX_RESOURCES,
        }
    }
}

/// Configuration for a fenced pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub name: String,
    pub initial_count: usize,
    pub growth: GrowthPolicy,
    /// Total budget for waiting on pending fences at teardown.
    pub drain_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            initial_count: DEFAULT_INITIAL_COUNT,
            growth: GrowthPolicy::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Clamp values into a usable range.
    pub fn normalized(mut self) -> Self {
        self.growth.grow_by = self.growth.grow_by.max(1);
        self.growth.max_resources = self.growth.max_resources.max(self.initial_count).max(1);
        if self.name.is_empty() {
            self.name = DEFAULT_POOL_NAME.to_string();
        }
        self
    }

    /// Load from `FENCED_POOL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let name = std::env::var("FENCED_POOL_NAME").unwrap_or(defaults.name);
        let initial_count = parse_usize("FENCED_POOL_INITIAL_COUNT", DEFAULT_INITIAL_COUNT);
        let grow_by = parse_usize("FENCED_POOL_GROW_BY", DEFAULT_GROW_BY);
        let max_resources = parse_usize("FENCED_POOL_MAX_RESOURCES", DEFAULT_MAX_RESOURCES);
        let drain_ms = parse_u64(
            "FENCED_POOL_DRAIN_TIMEOUT_MS",
            DEFAULT_DRAIN_TIMEOUT.as_millis() as u64,
        );

        Self {
            name,
            initial_count,
            growth: GrowthPolicy {
                grow_by,
                max_resources,
            },
            drain_timeout: Duration::from_millis(drain_ms),
        }
        .normalized()
    }

    /// Parse the `[pool]` table of a TOML document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        let section = file.pool;
        let defaults = Self::default();

        Ok(Self {
            name: section.name.unwrap_or(defaults.name),
            initial_count: section.initial_count.unwrap_or(defaults.initial_count),
            growth: GrowthPolicy {
                grow_by: section.grow_by.unwrap_or(defaults.growth.grow_by),
                max_resources: section.max_resources.unwrap_or(defaults.growth.max_resources),
            },
            drain_timeout: section
                .drain_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.drain_timeout),
        }
        .normalized())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pool: PoolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolSection {
    name: Option<String>,
    initial_count: Option<usize>,
    grow_by: Option<usize>,
    max_resources: Option<usize>,
    drain_timeout_ms: Option<u64>,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Engine tuning configuration, loaded from TOML.
//!
//! The core itself has no on-disk state (persistence is an external
//! collaborator's job), but a handful of knobs govern the epoch
//! reclaimer and the thread-local allocator. This module loads them from
//! a TOML file with a read-parse-validate shape.

use crate::error::{LatticeError, LatticeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine tuning knobs.
///
/// ## Example
/// ```no_run
/// use latticekv::config::EngineConfig;
///
/// let config = EngineConfig::load("lattice.toml")?;
/// # Ok::<(), latticekv::LatticeError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often the background timer advances the global epoch, in
    /// milliseconds. A worker that calls `rcu_quiesce` more often than
    /// this sees no new reclamation opportunities.
    #[serde(default = "default_epoch_tick_ms")]
    pub epoch_tick_ms: u64,

    /// Largest allocation size class served by the thread-local pool, in
    /// cache lines (64 bytes each). Larger requests fall through to the
    /// system allocator.
    #[serde(default = "default_pool_size_class_cap")]
    pub pool_size_class_cap: usize,

    /// Hint for how many worker threads the embedding process expects to
    /// register `ThreadContext`s for. Purely informational — used to
    /// pre-size the epoch manager's per-thread table.
    #[serde(default = "default_worker_hint")]
    pub worker_hint: usize,
}

fn default_epoch_tick_ms() -> u64 {
    100
}

fn default_pool_size_class_cap() -> usize {
    20
}

fn default_worker_hint() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch_tick_ms: default_epoch_tick_ms(),
            pool_size_class_cap: default_pool_size_class_cap(),
            worker_hint: default_worker_hint(),
        }
    }
}

impl EngineConfig {
    pub fn epoch_tick(&self) -> Duration {
        Duration::from_millis(self.epoch_tick_ms)
    }

    /// Load configuration from a TOML file.
    ///
    /// ## Error Conditions
    /// - `ConfigIoError`: file missing or unreadable.
    /// - `ConfigParseError`: malformed TOML.
    /// - `InvalidConfig`: a field was present but out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> LatticeResult<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| LatticeError::ConfigIoError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> LatticeResult<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| LatticeError::ConfigParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> LatticeResult<()> {
        if self.epoch_tick_ms == 0 {
            return Err(LatticeError::InvalidConfig {
                field: "epoch_tick_ms".to_string(),
                reason: "must be nonzero".to_string(),
            });
        }
        if self.pool_size_class_cap == 0 || self.pool_size_class_cap > 4096 {
            return Err(LatticeError::InvalidConfig {
                field: "pool_size_class_cap".to_string(),
                reason: "must be in 1..=4096 cache lines".to_string(),
            });
        }
        Ok(())
    }
}

//! Placement policy — the knobs a single invocation runs with.

use vmshift_core::config::{DEFAULT_CPU_LIMIT, DEFAULT_MEMORY_LIMIT};
use vmshift_core::{LoadWeights, ShiftConfig};

use crate::error::{PlacementError, PlacementResult};

/// Policy for one placement invocation. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementPolicy {
    /// Keep the VM's current host as a candidate (allows a no-op result).
    pub rebalance: bool,
    /// Drop hosts above `cpu_limit` / `memory_limit`.
    pub enforce_limits: bool,
    cpu_limit: u8,
    memory_limit: u8,
    /// VM names never selected for migration.
    pub skip: Vec<String>,
    /// Weights for ordering VMs heaviest-first.
    pub weights: LoadWeights,
    /// Power VMs off around the relocation.
    pub cold_migrate: bool,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            rebalance: false,
            enforce_limits: true,
            cpu_limit: DEFAULT_CPU_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            skip: Vec::new(),
            weights: LoadWeights::default(),
            cold_migrate: false,
        }
    }
}

impl PlacementPolicy {
    /// Policy seeded from a parsed `vmshift.toml`.
    pub fn from_config(config: &ShiftConfig) -> Self {
        Self {
            rebalance: config.rebalance(),
            enforce_limits: config.enforce_limits(),
            cpu_limit: config.cpu_limit(),
            memory_limit: config.memory_limit(),
            skip: Vec::new(),
            weights: config.load_weights(),
            cold_migrate: false,
        }
    }

    /// Set utilization caps, in percent. Both must lie in `0..=100`.
    pub fn with_limits(mut self, cpu_limit: u32, memory_limit: u32) -> PlacementResult<Self> {
        self.cpu_limit = checked_limit("cpu_limit", cpu_limit)?;
        self.memory_limit = checked_limit("memory_limit", memory_limit)?;
        Ok(self)
    }

    pub fn with_rebalance(mut self, rebalance: bool) -> Self {
        self.rebalance = rebalance;
        self
    }

    pub fn with_enforce_limits(mut self, enforce: bool) -> Self {
        self.enforce_limits = enforce;
        self
    }

    pub fn with_skip<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_cold_migrate(mut self, cold: bool) -> Self {
        self.cold_migrate = cold;
        self
    }

    pub fn with_weights(mut self, weights: LoadWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn cpu_limit(&self) -> u8 {
        self.cpu_limit
    }

    pub fn memory_limit(&self) -> u8 {
        self.memory_limit
    }

    pub fn is_skipped(&self, vm: &str) -> bool {
        self.skip.iter().any(|s| s == vm)
    }
}

fn checked_limit(name: &'static str, value: u32) -> PlacementResult<u8> {
    if value > 100 {
        return Err(PlacementError::InvalidLimit { name, value });
    }
    Ok(value as u8)
}

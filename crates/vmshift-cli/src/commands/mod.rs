//! Subcommand implementations.
//!
//! Each command returns the status lines to print; `main` prints them after
//! the snapshot has been written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;

use vmshift_core::ShiftConfig;
use vmshift_inventory::{PollSettings, SnapshotInventory, TaskExecutor};
use vmshift_placement::{Advisor, PlacementPolicy};

use crate::PolicyArgs;

pub mod cluster;
pub mod host;
pub mod vm;

pub type SnapshotAdvisor<'a> = Advisor<&'a SnapshotInventory, TaskExecutor<&'a SnapshotInventory>>;

/// Loaded config and inventory for one invocation.
pub struct Session {
    pub config: ShiftConfig,
    pub inventory: SnapshotInventory,
    path: PathBuf,
}

impl Session {
    pub fn open(inventory_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(p) => ShiftConfig::from_file(p)
                .with_context(|| format!("failed to load config {}", p.display()))?,
            None => ShiftConfig::default(),
        };
        let inventory = SnapshotInventory::open(inventory_path)
            .with_context(|| format!("failed to open inventory {}", inventory_path.display()))?;
        debug!(inventory = %inventory_path.display(), "session opened");
        Ok(Self {
            config,
            inventory,
            path: inventory_path.to_path_buf(),
        })
    }

    pub fn save(&self) -> Result<()> {
        self.inventory
            .save(&self.path)
            .with_context(|| format!("failed to write inventory {}", self.path.display()))
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.config.poll_interval_ms()),
            timeout: self.config.timeout_secs().map(Duration::from_secs),
        }
    }

    pub fn advisor(&self) -> SnapshotAdvisor<'_> {
        Advisor::new(
            &self.inventory,
            TaskExecutor::new(&self.inventory, self.poll_settings()),
        )
    }

    /// Config defaults overridden by command-line flags.
    pub fn policy(&self, args: &PolicyArgs) -> PlacementPolicy {
        let mut policy = PlacementPolicy::from_config(&self.config)
            .with_skip(args.skip.iter().cloned())
            .with_cold_migrate(args.cold_migrate);
        if args.rebalance {
            policy = policy.with_rebalance(true);
        }
        if args.no_limit {
            policy = policy.with_enforce_limits(false);
        }
        policy
    }
}

/// Text lines as-is, or the value as pretty JSON.
pub fn render<T: Serialize>(format: &str, value: &T, text: impl FnOnce() -> Vec<String>) -> Result<Vec<String>> {
    match format {
        "text" => Ok(text()),
        "json" => Ok(vec![serde_json::to_string_pretty(value)?]),
        other => bail!("unknown output format: {other} (expected text or json)"),
    }
}

pub fn init(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let content = ShiftConfig::scaffold().to_toml_string()?;
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Generated {}", path.display());
    Ok(())
}

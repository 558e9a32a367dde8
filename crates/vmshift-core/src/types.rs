//! Shared types used across vmshift crates.
//!
//! Hosts and VMs are read-only snapshots of what the control plane reported
//! at call time. Stats the platform did not report are `None` rather than
//! zero, so callers can tell "idle" apart from "unknown".

use serde::{Deserialize, Serialize};

/// Name of a hypervisor host, unique within the inventory.
pub type HostName = String;

/// Name of a virtual machine, unique within the inventory.
pub type VmName = String;

/// Name of a cluster (placement domain).
pub type ClusterName = String;

// ── Host ──────────────────────────────────────────────────────────

/// Overall status colour reported by the control plane for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Green,
    Yellow,
    Red,
    #[default]
    Gray,
}

impl HostStatus {
    /// Only green hosts accept placements.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HostStatus::Green)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HostStatus::Green => "green",
            HostStatus::Yellow => "yellow",
            HostStatus::Red => "red",
            HostStatus::Gray => "gray",
        }
    }
}

/// Whether the control plane can currently reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Connected,
    Disconnected,
    NotResponding,
}

/// Live CPU and memory figures for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStats {
    pub cpu_used_mhz: u64,
    pub memory_used_mb: u64,
    /// Per-core clock multiplied by core count.
    pub cpu_capacity_mhz: u64,
    pub memory_total_mb: u64,
}

/// CPU and memory usage as percentages of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    pub cpu_pct: f64,
    pub memory_pct: f64,
}

impl HostStats {
    /// Ranking heuristic: CPU MHz used plus half the memory MB used.
    ///
    /// Not a percentage. Lower is preferred.
    pub fn combined_score(&self) -> u64 {
        self.cpu_used_mhz.saturating_add(self.memory_used_mb / 2)
    }

    /// Usage percentages, or `None` when either capacity is zero.
    pub fn utilization(&self) -> Option<Utilization> {
        if self.cpu_capacity_mhz == 0 || self.memory_total_mb == 0 {
            return None;
        }
        Some(Utilization {
            cpu_pct: self.cpu_used_mhz as f64 / self.cpu_capacity_mhz as f64 * 100.0,
            memory_pct: self.memory_used_mb as f64 / self.memory_total_mb as f64 * 100.0,
        })
    }

    /// Stats after a VM with `vm` load lands on this host.
    pub fn with_added(&self, vm: &VmStats) -> HostStats {
        HostStats {
            cpu_used_mhz: self.cpu_used_mhz.saturating_add(vm.cpu_usage_mhz),
            memory_used_mb: self.memory_used_mb.saturating_add(vm.guest_memory_mb),
            ..*self
        }
    }

    /// Stats after a VM with `vm` load leaves this host.
    pub fn with_removed(&self, vm: &VmStats) -> HostStats {
        HostStats {
            cpu_used_mhz: self.cpu_used_mhz.saturating_sub(vm.cpu_usage_mhz),
            memory_used_mb: self.memory_used_mb.saturating_sub(vm.guest_memory_mb),
            ..*self
        }
    }
}

/// A hypervisor host as seen at inventory time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCandidate {
    pub name: HostName,
    pub cluster: ClusterName,
    /// Description of the first CPU package. Compared byte-for-byte.
    #[serde(default)]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub stats: Option<HostStats>,
    #[serde(default)]
    pub in_maintenance: bool,
    #[serde(default)]
    pub status: HostStatus,
    #[serde(default)]
    pub connection: ConnectionState,
    /// Configuration issues reported by the platform, most recent first.
    #[serde(default)]
    pub config_issues: Vec<String>,
}

impl HostCandidate {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn combined_score(&self) -> Option<u64> {
        self.stats.as_ref().map(HostStats::combined_score)
    }

    pub fn utilization(&self) -> Option<Utilization> {
        self.stats.as_ref().and_then(HostStats::utilization)
    }
}

// ── VM ────────────────────────────────────────────────────────────

/// Power state of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    PoweredOn,
    #[default]
    PoweredOff,
    Suspended,
}

/// Live usage figures for a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStats {
    pub cpu_usage_mhz: u64,
    pub guest_memory_mb: u64,
}

/// Relative importance of CPU and memory when ordering VMs by load.
///
/// Values are percentages; the defaults weigh both equally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadWeights {
    pub cpu: u32,
    pub memory: u32,
}

impl Default for LoadWeights {
    fn default() -> Self {
        Self { cpu: 50, memory: 50 }
    }
}

/// A virtual machine as seen at inventory time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmCandidate {
    pub name: VmName,
    /// Name of the host currently running the VM.
    pub host: HostName,
    #[serde(default)]
    pub stats: Option<VmStats>,
    #[serde(default)]
    pub power_state: PowerState,
}

impl VmCandidate {
    /// Weighted load used to order VMs heaviest-first. Zero when stats are absent.
    pub fn load_score(&self, weights: &LoadWeights) -> f64 {
        match &self.stats {
            Some(s) => {
                s.cpu_usage_mhz as f64 * (f64::from(weights.cpu) / 100.0)
                    + s.guest_memory_mb as f64 * (f64::from(weights.memory) / 100.0)
            }
            None => 0.0,
        }
    }

    pub fn is_powered_on(&self) -> bool {
        self.power_state == PowerState::PoweredOn
    }
}

//! SnapshotInventory — a cluster simulated from a JSON snapshot.
//!
//! Loads hosts and VMs from a snapshot file, answers inventory queries from
//! memory, and applies every executor operation (relocation, power, host
//! maintenance, reboot and reconnect, VM destruction) to the in-memory copy.
//! `save` writes the result back. Relocation shifts the VM's usage from the
//! source host's stats to the target's, so later selections see the new load.

use std::cell::Cell;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vmshift_core::{ConnectionState, HostCandidate, PowerState, VmCandidate};

use crate::error::{InventoryError, InventoryResult, TaskError};
use crate::provider::InventoryProvider;
use crate::task::{Task, TaskBackend, TaskState};

/// On-disk layout of a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub hosts: Vec<HostCandidate>,
    #[serde(default)]
    pub vms: Vec<VmCandidate>,
}

/// In-memory cluster that acts as both inventory and task backend.
pub struct SnapshotInventory {
    state: RwLock<ClusterSnapshot>,
    task_latency: u32,
}

impl SnapshotInventory {
    /// Load a snapshot file.
    pub fn open(path: &Path) -> InventoryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: ClusterSnapshot = serde_json::from_str(&content)?;
        debug!(
            ?path,
            hosts = snapshot.hosts.len(),
            vms = snapshot.vms.len(),
            "snapshot inventory opened"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            task_latency: 0,
        }
    }

    /// Make every task report `Running` for `polls` polls before finishing.
    pub fn with_task_latency(mut self, polls: u32) -> Self {
        self.task_latency = polls;
        self
    }

    /// Write the current state to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> InventoryResult<()> {
        let json = serde_json::to_string_pretty(&*self.read()?)?;
        std::fs::write(path, json)?;
        debug!(?path, "snapshot inventory saved");
        Ok(())
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> InventoryResult<ClusterSnapshot> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> InventoryResult<RwLockReadGuard<'_, ClusterSnapshot>> {
        self.state.read().map_err(|_| InventoryError::Lock)
    }

    fn write(&self) -> InventoryResult<RwLockWriteGuard<'_, ClusterSnapshot>> {
        self.state.write().map_err(|_| InventoryError::Lock)
    }

    fn finish(&self, outcome: Result<(), String>) -> SnapshotTask {
        let state = match outcome {
            Ok(()) => TaskState::Success,
            Err(reason) => TaskState::Error(reason),
        };
        SnapshotTask {
            remaining: Cell::new(self.task_latency),
            terminal: state,
        }
    }
}

fn relocate(snapshot: &mut ClusterSnapshot, vm_name: &str, target: &str) -> Result<(), String> {
    let vm_idx = snapshot
        .vms
        .iter()
        .position(|v| v.name == vm_name)
        .ok_or_else(|| format!("vm {vm_name} not found"))?;
    let target_idx = snapshot
        .hosts
        .iter()
        .position(|h| h.name == target)
        .ok_or_else(|| format!("host {target} not found"))?;

    if snapshot.hosts[target_idx].in_maintenance {
        return Err(format!("host {target} is in maintenance mode"));
    }

    let source = snapshot.vms[vm_idx].host.clone();
    if source == target {
        return Ok(());
    }

    if let Some(load) = snapshot.vms[vm_idx].stats {
        if let Some(src) = snapshot.hosts.iter_mut().find(|h| h.name == source) {
            src.stats = src.stats.map(|s| s.with_removed(&load));
        }
        let dst = &mut snapshot.hosts[target_idx];
        dst.stats = dst.stats.map(|s| s.with_added(&load));
    }
    snapshot.vms[vm_idx].host = target.to_string();

    info!(vm = vm_name, from = %source, to = target, "relocated vm");
    Ok(())
}

fn set_power(snapshot: &mut ClusterSnapshot, vm_name: &str, on: bool) -> Result<(), String> {
    let vm = snapshot
        .vms
        .iter_mut()
        .find(|v| v.name == vm_name)
        .ok_or_else(|| format!("vm {vm_name} not found"))?;

    let desired = if on {
        PowerState::PoweredOn
    } else {
        PowerState::PoweredOff
    };
    if vm.power_state == desired {
        return Err(format!("vm {vm_name} is already {}", if on { "powered on" } else { "powered off" }));
    }
    vm.power_state = desired;
    Ok(())
}

fn set_maintenance(snapshot: &mut ClusterSnapshot, host_name: &str, enter: bool) -> Result<(), String> {
    let running = snapshot
        .vms
        .iter()
        .filter(|v| v.host == host_name && v.is_powered_on())
        .count();
    let host = snapshot
        .hosts
        .iter_mut()
        .find(|h| h.name == host_name)
        .ok_or_else(|| format!("host {host_name} not found"))?;

    if enter && running > 0 {
        return Err(format!("host {host_name} still runs {running} powered-on vms"));
    }
    host.in_maintenance = enter;
    Ok(())
}

fn reboot(snapshot: &ClusterSnapshot, host_name: &str) -> Result<(), String> {
    let host = snapshot
        .hosts
        .iter()
        .find(|h| h.name == host_name)
        .ok_or_else(|| format!("host {host_name} not found"))?;
    if !host.in_maintenance {
        return Err(format!("host {host_name} must be in maintenance mode to reboot"));
    }
    info!(host = host_name, "rebooted host");
    Ok(())
}

fn reconnect(snapshot: &mut ClusterSnapshot, host_name: &str) -> Result<(), String> {
    let host = snapshot
        .hosts
        .iter_mut()
        .find(|h| h.name == host_name)
        .ok_or_else(|| format!("host {host_name} not found"))?;
    host.connection = ConnectionState::Connected;
    Ok(())
}

fn destroy(snapshot: &mut ClusterSnapshot, vm_name: &str) -> Result<(), String> {
    let idx = snapshot
        .vms
        .iter()
        .position(|v| v.name == vm_name)
        .ok_or_else(|| format!("vm {vm_name} not found"))?;
    if snapshot.vms[idx].is_powered_on() {
        return Err(format!("vm {vm_name} is powered on"));
    }

    let vm = snapshot.vms.remove(idx);
    if let Some(load) = vm.stats {
        if let Some(host) = snapshot.hosts.iter_mut().find(|h| h.name == vm.host) {
            host.stats = host.stats.map(|s| s.with_removed(&load));
        }
    }
    info!(vm = vm_name, host = %vm.host, "destroyed vm");
    Ok(())
}

impl InventoryProvider for SnapshotInventory {
    fn list_hosts(&self, cluster: &str) -> InventoryResult<Vec<HostCandidate>> {
        Ok(self
            .read()?
            .hosts
            .iter()
            .filter(|h| h.cluster == cluster)
            .cloned()
            .collect())
    }

    fn list_vms(&self, host: &str) -> InventoryResult<Vec<VmCandidate>> {
        Ok(self
            .read()?
            .vms
            .iter()
            .filter(|v| v.host == host)
            .cloned()
            .collect())
    }

    fn find_host(&self, name: &str) -> InventoryResult<Option<HostCandidate>> {
        Ok(self.read()?.hosts.iter().find(|h| h.name == name).cloned())
    }

    fn find_vm(&self, name: &str) -> InventoryResult<Option<VmCandidate>> {
        Ok(self.read()?.vms.iter().find(|v| v.name == name).cloned())
    }
}

impl TaskBackend for SnapshotInventory {
    type Task = SnapshotTask;

    fn start_relocate(&self, vm: &str, target_host: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = relocate(&mut *self.write()?, vm, target_host);
        Ok(self.finish(outcome))
    }

    fn start_power_off(&self, vm: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = set_power(&mut *self.write()?, vm, false);
        Ok(self.finish(outcome))
    }

    fn start_power_on(&self, vm: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = set_power(&mut *self.write()?, vm, true);
        Ok(self.finish(outcome))
    }

    fn start_maintenance(&self, host: &str, enter: bool) -> Result<SnapshotTask, TaskError> {
        let outcome = set_maintenance(&mut *self.write()?, host, enter);
        Ok(self.finish(outcome))
    }

    fn start_reboot(&self, host: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = reboot(&*self.read()?, host);
        Ok(self.finish(outcome))
    }

    fn start_reconnect(&self, host: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = reconnect(&mut *self.write()?, host);
        Ok(self.finish(outcome))
    }

    fn start_destroy(&self, vm: &str) -> Result<SnapshotTask, TaskError> {
        let outcome = destroy(&mut *self.write()?, vm);
        Ok(self.finish(outcome))
    }
}

/// Task handle returned by [`SnapshotInventory`]. The change is applied
/// when the task starts; polling only models the platform's latency.
pub struct SnapshotTask {
    remaining: Cell<u32>,
    terminal: TaskState,
}

impl Task for SnapshotTask {
    fn state(&self) -> Result<TaskState, TaskError> {
        let left = self.remaining.get();
        if left > 0 {
            self.remaining.set(left - 1);
            return Ok(TaskState::Running);
        }
        Ok(self.terminal.clone())
    }
}

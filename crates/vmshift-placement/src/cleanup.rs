//! Unknown VM cleanup.
//!
//! VMs whose registration the control plane lost show up with "Unknown" in
//! their name. They hold resources but can't be managed, so the cleanup pass
//! lists them and, on request, powers them off and destroys them. A VM that
//! fails to destroy is recorded and the pass moves on.

use serde::Serialize;
use tracing::{info, warn};

use vmshift_core::VmCandidate;
use vmshift_inventory::{InventoryProvider, MigrationExecutor, TaskError};

use crate::advisor::Advisor;
use crate::error::{PlacementError, PlacementResult};

/// Substring that marks an orphaned VM.
pub const UNKNOWN_VM_MARKER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub vm: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cluster: String,
    pub found: Vec<String>,
    pub destroyed: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn status_lines(&self) -> Vec<String> {
        if self.found.is_empty() {
            return vec!["No unknown VMs found".to_string()];
        }
        let mut lines = vec![format!("Found {} unknown VMs", self.found.len())];
        if self.destroyed.is_empty() && self.failed.is_empty() {
            lines.extend(self.found.iter().cloned());
        }
        lines.extend(self.destroyed.iter().map(|vm| format!("Successfully destroyed {vm}")));
        lines.extend(
            self.failed
                .iter()
                .map(|f| format!("Failed to destroy {}: {}", f.vm, f.reason)),
        );
        lines
    }
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    /// Every VM in `cluster` whose name carries [`UNKNOWN_VM_MARKER`].
    pub fn find_unknown_vms(&self, cluster: &str) -> PlacementResult<Vec<VmCandidate>> {
        let hosts = self.inventory().list_hosts(cluster)?;
        if hosts.is_empty() {
            return Err(PlacementError::ClusterNotFound(cluster.to_string()));
        }

        let mut unknown = Vec::new();
        for host in &hosts {
            unknown.extend(
                self.inventory()
                    .list_vms(&host.name)?
                    .into_iter()
                    .filter(|vm| vm.name.contains(UNKNOWN_VM_MARKER)),
            );
        }
        Ok(unknown)
    }

    /// List unknown VMs in `cluster`; with `destroy`, power each off if
    /// needed and destroy it.
    pub fn remove_unknown_vms(&self, cluster: &str, destroy: bool) -> PlacementResult<CleanupReport> {
        let unknown = self.find_unknown_vms(cluster)?;
        info!(cluster, found = unknown.len(), destroy, "unknown vm scan");

        let mut report = CleanupReport {
            cluster: cluster.to_string(),
            found: unknown.iter().map(|vm| vm.name.clone()).collect(),
            destroyed: Vec::new(),
            failed: Vec::new(),
        };
        if !destroy {
            return Ok(report);
        }

        for vm in &unknown {
            match self.destroy_one(vm) {
                Ok(()) => report.destroyed.push(vm.name.clone()),
                Err(e) => {
                    warn!(vm = %vm.name, error = %e, "failed to destroy unknown vm");
                    report.failed.push(CleanupFailure {
                        vm: vm.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn destroy_one(&self, vm: &VmCandidate) -> Result<(), TaskError> {
        if vm.is_powered_on() {
            self.executor().power_off(&vm.name)?;
        }
        self.executor().destroy_vm(&vm.name)?;
        info!(vm = %vm.name, host = %vm.host, "destroyed unknown vm");
        Ok(())
    }
}

//! Host-wide migration — drain a host's VMs heaviest first.
//!
//! The batch is fail-fast: once one VM has nowhere better to go, the rest of
//! the queue is assumed to be in the same position and is left alone. Moves
//! already performed are not rolled back.

use serde::Serialize;
use tracing::{info, warn};

use vmshift_core::VmCandidate;
use vmshift_inventory::{InventoryProvider, MigrationExecutor};

use crate::advisor::{Advisor, Move, PlacementOutcome};
use crate::error::{PlacementError, PlacementResult};
use crate::policy::PlacementPolicy;
use crate::scorer::order_vms;

/// Why a batch stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Every queued VM was handled.
    Exhausted,
    /// `vm` had no eligible target; the rest of the queue was skipped.
    NoTarget { vm: String },
    /// `vm` is already on its best host; the rest of the queue was skipped.
    AlreadyOptimal { vm: String },
    /// No target host sits below the cluster average.
    NoTargetBelowAverage,
    /// The migration cap was reached.
    LimitReached,
}

/// Outcome of a host-wide migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub host: String,
    pub migrated: Vec<Move>,
    /// VMs left out because of the skip list.
    pub skipped: Vec<String>,
    pub reason: TerminationReason,
}

impl MigrationReport {
    pub fn count(&self) -> usize {
        self.migrated.len()
    }

    /// Human-readable summary, one line per event.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .skipped
            .iter()
            .map(|vm| format!("Skipping {vm}"))
            .collect();
        lines.extend(
            self.migrated
                .iter()
                .map(|m| format!("Migrated {} from {} to {}", m.vm, m.from, m.to)),
        );
        match &self.reason {
            TerminationReason::NoTarget { vm } => {
                lines.push(format!("No eligible host found for {vm}. Skipping remaining VMs."));
            }
            TerminationReason::AlreadyOptimal { vm } => {
                lines.push(format!(
                    "{vm} is already located on the optimal host. Skipping remaining VMs."
                ));
            }
            TerminationReason::NoTargetBelowAverage => {
                lines.push("No hosts below cluster average utilization.".to_string());
            }
            TerminationReason::LimitReached => {
                lines.push("Migration limit reached.".to_string());
            }
            TerminationReason::Exhausted => {}
        }
        if self.migrated.is_empty() {
            if matches!(self.reason, TerminationReason::Exhausted) {
                lines.push(format!("No vms found on {}", self.host));
            }
        } else {
            lines.push(format!(
                "Successfully migrated {} vms from {}",
                self.count(),
                self.host
            ));
        }
        lines
    }
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    /// Migrate every VM off `host_name`, heaviest first, until one has no
    /// better place to go.
    ///
    /// A failed relocation aborts the batch with
    /// [`PlacementError::BatchAborted`], which carries the moves made so far.
    pub fn migrate_host_vms(
        &self,
        host_name: &str,
        policy: &PlacementPolicy,
    ) -> PlacementResult<MigrationReport> {
        let source = self
            .inventory()
            .find_host(host_name)?
            .ok_or_else(|| PlacementError::HostNotFound(host_name.to_string()))?;

        let (queue, skipped) = split_queue(self.inventory().list_vms(host_name)?, policy);

        info!(
            host = host_name,
            queued = queue.len(),
            skipped = skipped.len(),
            "migrating host vms"
        );

        let mut migrated = Vec::new();
        let mut reason = TerminationReason::Exhausted;

        for vm in &queue {
            match self.place_from(vm, &source, policy) {
                Ok(PlacementOutcome::Migrated(m)) => migrated.push(m),
                Ok(PlacementOutcome::AlreadyOptimal) => {
                    reason = TerminationReason::AlreadyOptimal { vm: vm.name.clone() };
                    break;
                }
                Ok(PlacementOutcome::NoTarget) => {
                    reason = TerminationReason::NoTarget { vm: vm.name.clone() };
                    break;
                }
                Err(e) => {
                    warn!(host = host_name, vm = %vm.name, migrated = migrated.len(), error = %e, "batch aborted");
                    return Err(PlacementError::BatchAborted {
                        migrated,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(host = host_name, migrated = migrated.len(), ?reason, "host migration finished");
        Ok(MigrationReport {
            host: host_name.to_string(),
            migrated,
            skipped,
            reason,
        })
    }
}

/// Order `vms` heaviest first and pull out skip-listed names.
pub(crate) fn split_queue(vms: Vec<VmCandidate>, policy: &PlacementPolicy) -> (Vec<VmCandidate>, Vec<String>) {
    let (queue, skipped): (Vec<_>, Vec<_>) = order_vms(vms, &policy.weights)
        .into_iter()
        .partition(|vm| !policy.is_skipped(&vm.name));
    (queue, skipped.into_iter().map(|vm| vm.name).collect())
}

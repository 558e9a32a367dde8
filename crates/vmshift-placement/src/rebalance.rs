//! Bulk rebalance — spread a host's VMs round-robin over quiet hosts.
//!
//! Targets are restricted to hosts strictly below the cluster's average
//! combined score, then VMs are dealt out to them in turn, heaviest VM
//! first. Targets are not re-scored between moves. To keep a run of VMs
//! from piling onto one host past its caps, a projected load is kept per
//! target and, with limits enforced, a target whose projection would cross
//! a cap is passed over for that VM.

use tracing::{debug, info, warn};

use vmshift_core::{HostStats, VmCandidate};
use vmshift_inventory::{InventoryProvider, MigrationExecutor};

use crate::advisor::{Advisor, MigrationOutcome};
use crate::batch::{MigrationReport, TerminationReason, split_queue};
use crate::error::{PlacementError, PlacementResult};
use crate::policy::PlacementPolicy;
use crate::scorer::{HostScore, average_score, exceeds_limits};

/// Round-robin cursor over a fixed set of targets with projected loads.
struct TargetRing {
    targets: Vec<HostScore>,
    projected: Vec<HostStats>,
    cursor: usize,
}

impl TargetRing {
    fn new(targets: Vec<HostScore>) -> Self {
        // Scored hosts always carry stats, so indices line up.
        let projected = targets
            .iter()
            .filter_map(|t| t.host.stats)
            .collect::<Vec<_>>();
        Self {
            targets,
            projected,
            cursor: 0,
        }
    }

    /// Next target in turn that can take `vm`, advancing the cursor past it.
    fn next_for(&mut self, vm: &VmCandidate, policy: &PlacementPolicy) -> Option<usize> {
        let count = self.targets.len();
        for offset in 0..count {
            let idx = (self.cursor + offset) % count;
            if policy.enforce_limits {
                if let Some(load) = &vm.stats {
                    let after = self.projected[idx].with_added(load);
                    let fits = after
                        .utilization()
                        .is_some_and(|u| !exceeds_limits(&u, policy.cpu_limit(), policy.memory_limit()));
                    if !fits {
                        debug!(vm = %vm.name, target = %self.targets[idx].host.name, "projected load over limit");
                        continue;
                    }
                }
            }
            self.cursor = idx + 1;
            return Some(idx);
        }
        None
    }

    fn record(&mut self, idx: usize, vm: &VmCandidate) {
        if let Some(load) = &vm.stats {
            self.projected[idx] = self.projected[idx].with_added(load);
        }
    }
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    /// Spread `host_name`'s VMs across hosts below the cluster average,
    /// performing at most `max_migrations` relocations.
    ///
    /// The source host is never a target, whatever `policy.rebalance` says.
    pub fn bulk_rebalance(
        &self,
        host_name: &str,
        max_migrations: u32,
        policy: &PlacementPolicy,
    ) -> PlacementResult<MigrationReport> {
        let source = self
            .inventory()
            .find_host(host_name)?
            .ok_or_else(|| PlacementError::HostNotFound(host_name.to_string()))?;

        let target_policy = policy.clone().with_rebalance(false);
        let ranked = self.rank_targets(&source, &target_policy)?;
        let (queue, skipped) = split_queue(self.inventory().list_vms(host_name)?, policy);

        let mut report = MigrationReport {
            host: host_name.to_string(),
            migrated: Vec::new(),
            skipped,
            reason: TerminationReason::Exhausted,
        };

        let Some(average) = average_score(&ranked) else {
            report.reason = TerminationReason::NoTargetBelowAverage;
            return Ok(report);
        };
        let below: Vec<HostScore> = ranked
            .into_iter()
            .filter(|s| (s.combined as f64) < average)
            .collect();
        if below.is_empty() {
            info!(host = host_name, average, "no hosts below cluster average");
            report.reason = TerminationReason::NoTargetBelowAverage;
            return Ok(report);
        }

        info!(
            host = host_name,
            average,
            targets = below.len(),
            queued = queue.len(),
            max_migrations,
            "bulk rebalance"
        );

        let mut ring = TargetRing::new(below);
        for vm in &queue {
            if report.migrated.len() >= max_migrations as usize {
                report.reason = TerminationReason::LimitReached;
                break;
            }
            let Some(idx) = ring.next_for(vm, policy) else {
                report.reason = TerminationReason::NoTarget { vm: vm.name.clone() };
                break;
            };

            let target = &ring.targets[idx].host;
            match self.relocate_with(vm, target, policy) {
                Ok(MigrationOutcome::Migrated(m)) => {
                    ring.record(idx, vm);
                    report.migrated.push(m);
                }
                Ok(MigrationOutcome::AlreadyOptimal) => {}
                Err(e) => {
                    warn!(host = host_name, vm = %vm.name, error = %e, "bulk rebalance aborted");
                    return Err(PlacementError::BatchAborted {
                        migrated: report.migrated,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(host = host_name, migrated = report.count(), reason = ?report.reason, "bulk rebalance finished");
        Ok(report)
    }
}

//! Maintenance mode, host evacuation and host lifecycle (reboot, reconnect).

use serde::Serialize;
use tracing::{info, warn};

use vmshift_inventory::{InventoryProvider, MigrationExecutor};

use crate::advisor::Advisor;
use crate::batch::{MigrationReport, TerminationReason};
use crate::error::{PlacementError, PlacementResult};
use crate::policy::PlacementPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceOutcome {
    Entered,
    Exited,
    AlreadyInMaintenance,
    NotInMaintenance,
}

impl MaintenanceOutcome {
    pub fn describe(&self, host: &str) -> String {
        match self {
            MaintenanceOutcome::Entered => format!("Placed {host} into maintenance mode"),
            MaintenanceOutcome::Exited => format!("{host} exited maintenance mode"),
            MaintenanceOutcome::AlreadyInMaintenance => format!("{host} is already in maintenance mode"),
            MaintenanceOutcome::NotInMaintenance => format!("{host} is not in maintenance mode"),
        }
    }
}

/// What happened to maintenance mode after an evacuation drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MaintenanceStep {
    Done { outcome: MaintenanceOutcome },
    /// The drain stopped early; the host was left as is.
    DrainIncomplete,
    /// Skip-listed VMs are still running on the host.
    Blocked { vms: Vec<String> },
    /// The platform refused the maintenance change.
    Failed { reason: String },
}

/// Result of draining a host and putting it into maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvacuationReport {
    pub migration: MigrationReport,
    pub maintenance: MaintenanceStep,
}

impl EvacuationReport {
    /// True when the host ended up in maintenance mode.
    pub fn is_complete(&self) -> bool {
        matches!(self.maintenance, MaintenanceStep::Done { .. })
    }

    pub fn status_lines(&self) -> Vec<String> {
        let host = &self.migration.host;
        let mut lines = self.migration.status_lines();
        lines.push(match &self.maintenance {
            MaintenanceStep::Done { outcome } => outcome.describe(host),
            MaintenanceStep::DrainIncomplete => {
                format!("{host} still has VMs, not entering maintenance mode")
            }
            MaintenanceStep::Blocked { vms } => format!(
                "{host} still runs {}, not entering maintenance mode",
                vms.join(", ")
            ),
            MaintenanceStep::Failed { reason } => {
                format!("Failed to place {host} into maintenance mode: {reason}")
            }
        });
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectOutcome {
    Reconnected,
    AlreadyConnected,
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    /// Enter or exit maintenance mode. No call is made when the host is
    /// already in the requested state.
    pub fn set_maintenance_mode(&self, host_name: &str, enter: bool) -> PlacementResult<MaintenanceOutcome> {
        let host = self
            .inventory()
            .find_host(host_name)?
            .ok_or_else(|| PlacementError::HostNotFound(host_name.to_string()))?;

        match (enter, host.in_maintenance) {
            (true, true) => return Ok(MaintenanceOutcome::AlreadyInMaintenance),
            (false, false) => return Ok(MaintenanceOutcome::NotInMaintenance),
            _ => {}
        }

        info!(host = host_name, enter, "changing maintenance mode");
        self.executor()
            .set_maintenance(host_name, enter)
            .map_err(|e| PlacementError::MaintenanceFailed {
                host: host_name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(if enter {
            MaintenanceOutcome::Entered
        } else {
            MaintenanceOutcome::Exited
        })
    }

    /// Drain `host_name` with [`Advisor::migrate_host_vms`], then enter
    /// maintenance mode if nothing powered on is left behind.
    ///
    /// Once the drain has moved VMs, a refused maintenance change is
    /// reported in [`EvacuationReport::maintenance`] rather than returned as
    /// an error, so the moves stay visible.
    pub fn evacuate_host(&self, host_name: &str, policy: &PlacementPolicy) -> PlacementResult<EvacuationReport> {
        let migration = self.migrate_host_vms(host_name, policy)?;

        if migration.reason != TerminationReason::Exhausted {
            info!(host = host_name, reason = ?migration.reason, "drain incomplete, leaving host out of maintenance");
            return Ok(EvacuationReport {
                migration,
                maintenance: MaintenanceStep::DrainIncomplete,
            });
        }

        let mut running = Vec::new();
        for name in &migration.skipped {
            if let Some(vm) = self.inventory().find_vm(name)? {
                if vm.host == host_name && vm.is_powered_on() {
                    running.push(vm.name);
                }
            }
        }
        if !running.is_empty() {
            info!(host = host_name, vms = ?running, "skipped vms still running, leaving host out of maintenance");
            return Ok(EvacuationReport {
                migration,
                maintenance: MaintenanceStep::Blocked { vms: running },
            });
        }

        let maintenance = match self.set_maintenance_mode(host_name, true) {
            Ok(outcome) => MaintenanceStep::Done { outcome },
            Err(PlacementError::MaintenanceFailed { reason, .. }) => {
                warn!(host = host_name, migrated = migration.count(), %reason, "maintenance mode refused after drain");
                MaintenanceStep::Failed { reason }
            }
            Err(e) => return Err(e),
        };
        Ok(EvacuationReport {
            migration,
            maintenance,
        })
    }

    /// Gracefully reboot a host. The host must already be in maintenance
    /// mode; no call is made otherwise.
    pub fn reboot_host(&self, host_name: &str) -> PlacementResult<()> {
        let host = self
            .inventory()
            .find_host(host_name)?
            .ok_or_else(|| PlacementError::HostNotFound(host_name.to_string()))?;
        if !host.in_maintenance {
            return Err(PlacementError::NotInMaintenance(host_name.to_string()));
        }

        info!(host = host_name, "rebooting host");
        self.executor()
            .reboot_host(host_name)
            .map_err(|e| PlacementError::HostTaskFailed {
                host: host_name.to_string(),
                action: "reboot",
                reason: e.to_string(),
            })
    }

    /// Reconnect a host the control plane has lost. Connected hosts are
    /// left alone.
    pub fn reconnect_host(&self, host_name: &str) -> PlacementResult<ReconnectOutcome> {
        let host = self
            .inventory()
            .find_host(host_name)?
            .ok_or_else(|| PlacementError::HostNotFound(host_name.to_string()))?;
        if host.is_connected() {
            return Ok(ReconnectOutcome::AlreadyConnected);
        }

        info!(host = host_name, state = ?host.connection, "reconnecting host");
        self.executor()
            .reconnect_host(host_name)
            .map_err(|e| PlacementError::HostTaskFailed {
                host: host_name.to_string(),
                action: "reconnect",
                reason: e.to_string(),
            })?;
        Ok(ReconnectOutcome::Reconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::tests::{FakeCluster, host, vm};
    use vmshift_core::{ConnectionState, PowerState};

    fn advisor(cluster: &FakeCluster) -> Advisor<&FakeCluster, &FakeCluster> {
        Advisor::new(cluster, cluster)
    }

    #[test]
    fn enter_and_exit_issue_calls() {
        let mut in_maint = host("b", 0, 0);
        in_maint.in_maintenance = true;
        let cluster = FakeCluster {
            hosts: vec![host("a", 0, 0), in_maint],
            ..Default::default()
        };

        assert_eq!(
            advisor(&cluster).set_maintenance_mode("a", true).unwrap(),
            MaintenanceOutcome::Entered
        );
        assert_eq!(
            advisor(&cluster).set_maintenance_mode("b", false).unwrap(),
            MaintenanceOutcome::Exited
        );
        assert_eq!(
            *cluster.calls.borrow(),
            vec!["maintenance a true", "maintenance b false"]
        );
    }

    #[test]
    fn no_call_when_already_in_state() {
        let mut in_maint = host("b", 0, 0);
        in_maint.in_maintenance = true;
        let cluster = FakeCluster {
            hosts: vec![host("a", 0, 0), in_maint],
            ..Default::default()
        };

        assert_eq!(
            advisor(&cluster).set_maintenance_mode("a", false).unwrap(),
            MaintenanceOutcome::NotInMaintenance
        );
        assert_eq!(
            advisor(&cluster).set_maintenance_mode("b", true).unwrap(),
            MaintenanceOutcome::AlreadyInMaintenance
        );
        assert!(cluster.calls.borrow().is_empty());
    }

    #[test]
    fn evacuation_enters_maintenance_after_full_drain() {
        let cluster = FakeCluster {
            hosts: vec![host("src", 0, 0), host("dst", 0, 0)],
            vms: vec![vm("a", "src", 1, 1)],
            ..Default::default()
        };

        let report = advisor(&cluster)
            .evacuate_host("src", &PlacementPolicy::default())
            .unwrap();

        assert_eq!(report.migration.count(), 1);
        assert_eq!(
            report.maintenance,
            MaintenanceStep::Done {
                outcome: MaintenanceOutcome::Entered
            }
        );
        assert!(report.is_complete());
    }

    #[test]
    fn evacuation_skips_maintenance_after_partial_drain() {
        let cluster = FakeCluster {
            hosts: vec![host("src", 0, 0)],
            vms: vec![vm("a", "src", 1, 1)],
            ..Default::default()
        };

        let report = advisor(&cluster)
            .evacuate_host("src", &PlacementPolicy::default())
            .unwrap();

        assert_eq!(report.maintenance, MaintenanceStep::DrainIncomplete);
        assert!(cluster.calls.borrow().is_empty());
    }

    #[test]
    fn running_skipped_vm_blocks_maintenance() {
        let cluster = FakeCluster {
            hosts: vec![host("src", 0, 0), host("dst", 0, 0)],
            vms: vec![vm("a", "src", 1, 1), vm("vcenter", "src", 1, 1)],
            ..Default::default()
        };
        let policy = PlacementPolicy::default().with_skip(["vcenter"]);

        let report = advisor(&cluster).evacuate_host("src", &policy).unwrap();

        assert_eq!(report.migration.count(), 1);
        assert_eq!(
            report.maintenance,
            MaintenanceStep::Blocked {
                vms: vec!["vcenter".to_string()]
            }
        );
        assert!(!cluster.calls.borrow().iter().any(|c| c.starts_with("maintenance")));
        assert_eq!(
            report.status_lines().last().unwrap(),
            "src still runs vcenter, not entering maintenance mode"
        );
    }

    #[test]
    fn powered_off_skipped_vm_does_not_block() {
        let mut parked = vm("template", "src", 0, 0);
        parked.power_state = PowerState::PoweredOff;
        let cluster = FakeCluster {
            hosts: vec![host("src", 0, 0), host("dst", 0, 0)],
            vms: vec![vm("a", "src", 1, 1), parked],
            ..Default::default()
        };
        let policy = PlacementPolicy::default().with_skip(["template"]);

        let report = advisor(&cluster).evacuate_host("src", &policy).unwrap();
        assert!(report.is_complete());
    }

    #[test]
    fn refused_maintenance_keeps_the_moves() {
        let cluster = FakeCluster {
            hosts: vec![host("src", 0, 0), host("dst", 0, 0)],
            vms: vec![vm("a", "src", 1, 1), vm("b", "src", 2, 2)],
            fail_maintenance: true,
            ..Default::default()
        };

        let report = advisor(&cluster)
            .evacuate_host("src", &PlacementPolicy::default())
            .unwrap();

        assert_eq!(report.migration.count(), 2);
        assert!(matches!(report.maintenance, MaintenanceStep::Failed { .. }));
        assert!(!report.is_complete());
        assert!(report.status_lines().iter().any(|l| l == "Migrated b from src to dst"));
    }

    #[test]
    fn reboot_requires_maintenance() {
        let mut in_maint = host("b", 0, 0);
        in_maint.in_maintenance = true;
        let cluster = FakeCluster {
            hosts: vec![host("a", 0, 0), in_maint],
            ..Default::default()
        };

        let err = advisor(&cluster).reboot_host("a").unwrap_err();
        assert!(matches!(err, PlacementError::NotInMaintenance(ref h) if h == "a"));
        advisor(&cluster).reboot_host("b").unwrap();
        assert_eq!(*cluster.calls.borrow(), vec!["reboot b"]);
    }

    #[test]
    fn reconnect_only_touches_disconnected_hosts() {
        let mut lost = host("b", 0, 0);
        lost.connection = ConnectionState::Disconnected;
        let cluster = FakeCluster {
            hosts: vec![host("a", 0, 0), lost],
            ..Default::default()
        };

        assert_eq!(
            advisor(&cluster).reconnect_host("a").unwrap(),
            ReconnectOutcome::AlreadyConnected
        );
        assert_eq!(
            advisor(&cluster).reconnect_host("b").unwrap(),
            ReconnectOutcome::Reconnected
        );
        assert_eq!(*cluster.calls.borrow(), vec!["reconnect b"]);
        assert!(matches!(
            advisor(&cluster).reconnect_host("zz"),
            Err(PlacementError::HostNotFound(_))
        ));
    }
}

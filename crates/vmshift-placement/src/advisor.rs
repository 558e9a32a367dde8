//! Placement advisor — picks a target host and performs single-VM moves.
//!
//! The advisor owns no state of its own. It reads hosts through an
//! [`InventoryProvider`] on every call and hands moves to a
//! [`MigrationExecutor`], which blocks until the platform reports a
//! terminal task state.

use serde::Serialize;
use tracing::{debug, info, warn};

use vmshift_core::{HostCandidate, VmCandidate};
use vmshift_inventory::{InventoryProvider, MigrationExecutor, TaskError};

use crate::error::{PlacementError, PlacementResult};
use crate::policy::PlacementPolicy;
use crate::scorer::{HostScore, rank_hosts};

/// A completed relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Move {
    pub vm: String,
    pub from: String,
    pub to: String,
}

/// Result of moving a VM to an already chosen host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated(Move),
    /// The chosen host is the one the VM already runs on.
    AlreadyOptimal,
}

/// Result of selecting a host for a VM and moving it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    Migrated(Move),
    AlreadyOptimal,
    /// No host passed the eligibility and limit filters.
    NoTarget,
}

/// Placement advisor over an inventory and an executor.
pub struct Advisor<P, E> {
    inventory: P,
    executor: E,
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    pub fn new(inventory: P, executor: E) -> Self {
        Self {
            inventory,
            executor,
        }
    }

    pub fn inventory(&self) -> &P {
        &self.inventory
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Every acceptable target for a VM on `source_host`, best first.
    pub fn rank_targets(
        &self,
        source_host: &HostCandidate,
        policy: &PlacementPolicy,
    ) -> PlacementResult<Vec<HostScore>> {
        let hosts = self.inventory.list_hosts(&source_host.cluster)?;
        Ok(rank_hosts(hosts, source_host, policy))
    }

    /// The least utilized acceptable host, or `None` when nothing qualifies.
    pub fn select_target_host(
        &self,
        source_host: &HostCandidate,
        policy: &PlacementPolicy,
    ) -> PlacementResult<Option<HostCandidate>> {
        let best = self.rank_targets(source_host, policy)?.into_iter().next();
        match &best {
            Some(s) => debug!(
                source = %source_host.name,
                target = %s.host.name,
                score = s.combined,
                "selected target host"
            ),
            None => debug!(source = %source_host.name, "no eligible target host"),
        }
        Ok(best.map(|s| s.host))
    }

    /// Move `vm` onto `target`, unless it is already there.
    pub fn migrate_vm(&self, vm: &VmCandidate, target: &HostCandidate) -> PlacementResult<MigrationOutcome> {
        if target.name == vm.host {
            info!(vm = %vm.name, host = %vm.host, "vm is already on the optimal host");
            return Ok(MigrationOutcome::AlreadyOptimal);
        }

        info!(vm = %vm.name, from = %vm.host, to = %target.name, "migrating vm");
        self.executor
            .relocate(&vm.name, &target.name)
            .map_err(|e| migration_failed(&vm.name, e))?;

        Ok(MigrationOutcome::Migrated(Move {
            vm: vm.name.clone(),
            from: vm.host.clone(),
            to: target.name.clone(),
        }))
    }

    /// Like [`Advisor::migrate_vm`], but powers a running VM off first and
    /// back on after the move.
    ///
    /// If the relocation fails the VM stays powered off.
    pub fn cold_migrate_vm(
        &self,
        vm: &VmCandidate,
        target: &HostCandidate,
    ) -> PlacementResult<MigrationOutcome> {
        if target.name == vm.host {
            return self.migrate_vm(vm, target);
        }

        let was_on = vm.is_powered_on();
        if was_on {
            info!(vm = %vm.name, "powering off for cold migration");
            self.executor
                .power_off(&vm.name)
                .map_err(|e| migration_failed(&vm.name, e))?;
        }

        let outcome = self.migrate_vm(vm, target);
        if let Err(e) = &outcome {
            warn!(vm = %vm.name, error = %e, "cold migration failed, vm left powered off");
        }
        let outcome = outcome?;

        if was_on {
            info!(vm = %vm.name, host = %target.name, "powering on after cold migration");
            self.executor
                .power_on(&vm.name)
                .map_err(|e| migration_failed(&vm.name, e))?;
        }
        Ok(outcome)
    }

    /// Select a target for an already resolved VM and move it there.
    pub fn place_vm(&self, vm: &VmCandidate, policy: &PlacementPolicy) -> PlacementResult<PlacementOutcome> {
        let source = self
            .inventory
            .find_host(&vm.host)?
            .ok_or_else(|| PlacementError::HostNotFound(vm.host.clone()))?;
        self.place_from(vm, &source, policy)
    }

    /// Resolve a VM by name, then behave like [`Advisor::place_vm`].
    pub fn place_vm_by_name(&self, name: &str, policy: &PlacementPolicy) -> PlacementResult<PlacementOutcome> {
        let vm = self
            .inventory
            .find_vm(name)?
            .ok_or_else(|| PlacementError::VmNotFound(name.to_string()))?;
        self.place_vm(&vm, policy)
    }

    pub(crate) fn place_from(
        &self,
        vm: &VmCandidate,
        source: &HostCandidate,
        policy: &PlacementPolicy,
    ) -> PlacementResult<PlacementOutcome> {
        let Some(target) = self.select_target_host(source, policy)? else {
            return Ok(PlacementOutcome::NoTarget);
        };
        let outcome = self.relocate_with(vm, &target, policy)?;
        Ok(match outcome {
            MigrationOutcome::Migrated(m) => PlacementOutcome::Migrated(m),
            MigrationOutcome::AlreadyOptimal => PlacementOutcome::AlreadyOptimal,
        })
    }

    /// Warm or cold move, depending on the policy.
    pub(crate) fn relocate_with(
        &self,
        vm: &VmCandidate,
        target: &HostCandidate,
        policy: &PlacementPolicy,
    ) -> PlacementResult<MigrationOutcome> {
        if policy.cold_migrate {
            self.cold_migrate_vm(vm, target)
        } else {
            self.migrate_vm(vm, target)
        }
    }
}

fn migration_failed(vm: &str, err: TaskError) -> PlacementError {
    PlacementError::MigrationFailed {
        vm: vm.to_string(),
        reason: err.to_string(),
    }
}

use anyhow::{Result, anyhow};
use serde::Serialize;

use vmshift_inventory::InventoryProvider;
use vmshift_placement::{HostScore, PlacementOutcome};

use super::{Session, render};
use crate::PolicyArgs;

#[derive(Serialize)]
struct VmPlan {
    vm: String,
    host: String,
    targets: Vec<HostScore>,
}

pub fn migrate(session: &Session, name: &str, args: &PolicyArgs) -> Result<Vec<String>> {
    let policy = session.policy(args);
    let line = match session.advisor().place_vm_by_name(name, &policy)? {
        PlacementOutcome::Migrated(m) => format!("Migrating {} from {} to {}", m.vm, m.from, m.to),
        PlacementOutcome::AlreadyOptimal => format!("{name} is already located on the optimal host."),
        PlacementOutcome::NoTarget => format!("No eligible host found for {name}"),
    };
    Ok(vec![line])
}

pub fn plan(session: &Session, name: &str, args: &PolicyArgs, format: &str) -> Result<Vec<String>> {
    let policy = session.policy(args);
    let vm = session
        .inventory
        .find_vm(name)?
        .ok_or_else(|| anyhow!("vm not found: {name}"))?;
    let source = session
        .inventory
        .find_host(&vm.host)?
        .ok_or_else(|| anyhow!("host not found: {}", vm.host))?;
    let targets = session.advisor().rank_targets(&source, &policy)?;

    let plan = VmPlan {
        vm: vm.name,
        host: vm.host,
        targets,
    };
    render(format, &plan, || {
        if plan.targets.is_empty() {
            return vec![format!("No eligible host found for {}", plan.vm)];
        }
        let mut lines = vec![format!("Targets for {} (on {}):", plan.vm, plan.host)];
        lines.extend(plan.targets.iter().enumerate().map(|(i, s)| {
            format!(
                "  {}. {:<16} score {:>8}  cpu {:>5.1}%  mem {:>5.1}%",
                i + 1,
                s.name(),
                s.combined,
                s.utilization.cpu_pct,
                s.utilization.memory_pct
            )
        }));
        lines
    })
}

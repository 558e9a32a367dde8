use anyhow::{Result, bail};
use tracing::info;

use vmshift_placement::{MaintenanceStep, ReconnectOutcome};

use super::{Session, render};
use crate::PolicyArgs;

pub fn migrate(session: &Session, name: &str, args: &PolicyArgs, format: &str) -> Result<Vec<String>> {
    let policy = session.policy(args);
    let report = session.advisor().migrate_host_vms(name, &policy)?;
    render(format, &report, || report.status_lines())
}

pub fn rebalance(
    session: &Session,
    name: &str,
    max_migrations: Option<u32>,
    args: &PolicyArgs,
    format: &str,
) -> Result<Vec<String>> {
    let policy = session.policy(args);
    let max = max_migrations.unwrap_or_else(|| session.config.max_migrations());
    info!(host = name, max_migrations = max, "rebalancing host");
    let report = session.advisor().bulk_rebalance(name, max, &policy)?;
    render(format, &report, || report.status_lines())
}

pub fn maintenance(
    session: &Session,
    name: &str,
    enter: bool,
    migrate_vms: bool,
    args: &PolicyArgs,
) -> Result<Vec<String>> {
    let advisor = session.advisor();
    if enter && migrate_vms {
        let report = advisor.evacuate_host(name, &session.policy(args))?;
        let lines = report.status_lines();
        if matches!(report.maintenance, MaintenanceStep::Failed { .. }) {
            // Exit non-zero, but still show what was moved.
            bail!("{}", lines.join("\n"));
        }
        return Ok(lines);
    }
    let outcome = advisor.set_maintenance_mode(name, enter)?;
    Ok(vec![outcome.describe(name)])
}

pub fn reboot(session: &Session, name: &str) -> Result<Vec<String>> {
    session.advisor().reboot_host(name)?;
    Ok(vec![format!("Rebooted {name}")])
}

pub fn reconnect(session: &Session, name: &str) -> Result<Vec<String>> {
    let line = match session.advisor().reconnect_host(name)? {
        ReconnectOutcome::Reconnected => format!("Reconnected {name}"),
        ReconnectOutcome::AlreadyConnected => format!("{name} is already connected"),
    };
    Ok(vec![line])
}

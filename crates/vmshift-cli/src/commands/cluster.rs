use anyhow::Result;

use super::{Session, render};

pub fn health(session: &Session, name: &str, format: &str) -> Result<Vec<String>> {
    let report = session.advisor().cluster_health(name)?;
    render(format, &report, || report.status_lines())
}

pub fn unknown_vms(session: &Session, name: &str, destroy: bool, format: &str) -> Result<Vec<String>> {
    let report = session.advisor().remove_unknown_vms(name, destroy)?;
    render(format, &report, || report.status_lines())
}

//! Cluster health report — hosts that are not green, and why.

use serde::Serialize;

use vmshift_core::HostStatus;
use vmshift_inventory::{InventoryProvider, MigrationExecutor};

use crate::advisor::Advisor;
use crate::error::{PlacementError, PlacementResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProblem {
    pub host: String,
    pub status: HostStatus,
    /// First configuration issue reported for the host, if any.
    pub issue: Option<String>,
    pub in_maintenance: bool,
}

impl HostProblem {
    pub fn line(&self) -> String {
        let mut line = match &self.issue {
            Some(issue) => format!("{} - {}", self.host, issue),
            None => format!("{} ({})", self.host, self.status.label()),
        };
        if self.in_maintenance {
            line.push_str(". Host is in maintenance mode");
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub cluster: String,
    pub host_count: usize,
    pub problems: Vec<HostProblem>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn status_lines(&self) -> Vec<String> {
        if self.problems.is_empty() {
            return vec![format!("no hosts with issues found in {} cluster", self.cluster)];
        }
        let mut lines = vec![format!("{} hosts found with issues.", self.problems.len())];
        lines.extend(self.problems.iter().map(HostProblem::line));
        lines
    }
}

impl<P: InventoryProvider, E: MigrationExecutor> Advisor<P, E> {
    pub fn cluster_health(&self, cluster: &str) -> PlacementResult<HealthReport> {
        let hosts = self.inventory().list_hosts(cluster)?;
        if hosts.is_empty() {
            return Err(PlacementError::ClusterNotFound(cluster.to_string()));
        }

        let problems = hosts
            .iter()
            .filter(|h| !h.status.is_healthy())
            .map(|h| HostProblem {
                host: h.name.clone(),
                status: h.status,
                issue: h.config_issues.first().cloned(),
                in_maintenance: h.in_maintenance,
            })
            .collect();

        Ok(HealthReport {
            cluster: cluster.to_string(),
            host_count: hosts.len(),
            problems,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::tests::{FakeCluster, host};

    #[test]
    fn lists_non_green_hosts_with_first_issue() {
        let mut yellow = host("esx-2", 0, 0);
        yellow.status = HostStatus::Yellow;
        yellow.config_issues = vec!["NTP not configured".to_string(), "older".to_string()];
        yellow.in_maintenance = true;
        let mut red = host("esx-3", 0, 0);
        red.status = HostStatus::Red;
        let cluster = FakeCluster {
            hosts: vec![host("esx-1", 0, 0), yellow, red],
            ..Default::default()
        };

        let report = Advisor::new(&cluster, &cluster).cluster_health("prod").unwrap();

        assert_eq!(report.host_count, 3);
        assert!(!report.is_healthy());
        assert_eq!(
            report.status_lines(),
            vec![
                "2 hosts found with issues.",
                "esx-2 - NTP not configured. Host is in maintenance mode",
                "esx-3 (red)",
            ]
        );
    }

    #[test]
    fn healthy_cluster() {
        let cluster = FakeCluster {
            hosts: vec![host("esx-1", 0, 0)],
            ..Default::default()
        };
        let report = Advisor::new(&cluster, &cluster).cluster_health("prod").unwrap();
        assert!(report.is_healthy());
        assert_eq!(
            report.status_lines(),
            vec!["no hosts with issues found in prod cluster"]
        );
    }

    #[test]
    fn unknown_cluster() {
        let cluster = FakeCluster::default();
        let err = Advisor::new(&cluster, &cluster).cluster_health("nope").unwrap_err();
        assert!(matches!(err, PlacementError::ClusterNotFound(_)));
    }
}

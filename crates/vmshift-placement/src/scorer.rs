//! Host scoring for placement decisions.
//!
//! A host is a candidate when it is:
//! - **Available**: connected, not in maintenance mode, reporting a green status
//! - **Compatible**: same CPU model string as the source host, byte for byte
//! - **Measurable**: stats present with non-zero capacity
//!
//! Candidates are ranked by combined score (CPU MHz used plus half the
//! memory MB used), lowest first, ties broken by host name.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use vmshift_core::{ConnectionState, HostCandidate, HostStatus, LoadWeights, Utilization, VmCandidate};

use crate::policy::PlacementPolicy;

/// Why a host was not considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    Maintenance,
    Disconnected(ConnectionState),
    Unhealthy(HostStatus),
    CpuModelMismatch,
    MissingCpuModel,
    MissingStats,
}

/// A candidate host with its derived scores.
#[derive(Debug, Clone, Serialize)]
pub struct HostScore {
    pub host: HostCandidate,
    /// Ranking value. Lower is better.
    pub combined: u64,
    pub utilization: Utilization,
}

impl HostScore {
    pub fn name(&self) -> &str {
        &self.host.name
    }
}

/// Check maintenance, health and CPU model against `model`.
pub fn eligibility(host: &HostCandidate, model: &str) -> Result<(), Ineligible> {
    if host.in_maintenance {
        return Err(Ineligible::Maintenance);
    }
    if !host.is_connected() {
        return Err(Ineligible::Disconnected(host.connection));
    }
    if !host.status.is_healthy() {
        return Err(Ineligible::Unhealthy(host.status));
    }
    match host.cpu_model.as_deref() {
        None => Err(Ineligible::MissingCpuModel),
        Some(m) if m.as_bytes() != model.as_bytes() => Err(Ineligible::CpuModelMismatch),
        Some(_) => Ok(()),
    }
}

/// Combined score and utilization, or `None` when stats are unusable.
pub fn score_host(host: &HostCandidate) -> Option<HostScore> {
    let stats = host.stats?;
    let utilization = stats.utilization()?;
    Some(HostScore {
        host: host.clone(),
        combined: stats.combined_score(),
        utilization,
    })
}

/// True when either percentage is strictly above its cap.
pub fn exceeds_limits(utilization: &Utilization, cpu_limit: u8, memory_limit: u8) -> bool {
    utilization.cpu_pct > f64::from(cpu_limit) || utilization.memory_pct > f64::from(memory_limit)
}

/// Ascending by combined score, then by host name.
fn by_score_then_name(a: &HostScore, b: &HostScore) -> Ordering {
    a.combined
        .cmp(&b.combined)
        .then_with(|| a.host.name.cmp(&b.host.name))
}

/// Rank `hosts` as migration targets for a VM currently on `source`.
///
/// Applies the rebalance rule, eligibility, and (if enabled) the utilization
/// caps, then sorts best first. Returns an empty list when the source host
/// reports no CPU model, since nothing can be shown to match it.
pub fn rank_hosts(
    hosts: Vec<HostCandidate>,
    source: &HostCandidate,
    policy: &PlacementPolicy,
) -> Vec<HostScore> {
    let Some(model) = source.cpu_model.as_deref() else {
        debug!(host = %source.name, "source host has no cpu model, no target can match");
        return Vec::new();
    };

    let mut ranked: Vec<HostScore> = hosts
        .into_iter()
        .filter(|h| policy.rebalance || h.name != source.name)
        .filter(|h| match eligibility(h, model) {
            Ok(()) => true,
            Err(reason) => {
                debug!(host = %h.name, ?reason, "host not eligible");
                false
            }
        })
        .filter_map(|h| {
            let scored = score_host(&h);
            if scored.is_none() {
                debug!(host = %h.name, reason = ?Ineligible::MissingStats, "host not eligible");
            }
            scored
        })
        .filter(|s| {
            let over = policy.enforce_limits
                && exceeds_limits(&s.utilization, policy.cpu_limit(), policy.memory_limit());
            if over {
                debug!(
                    host = %s.host.name,
                    cpu_pct = s.utilization.cpu_pct,
                    memory_pct = s.utilization.memory_pct,
                    "host over utilization limit"
                );
            }
            !over
        })
        .collect();

    ranked.sort_by(by_score_then_name);
    ranked
}

/// Mean combined score, or `None` for an empty slice.
pub fn average_score(scores: &[HostScore]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: u64 = scores.iter().map(|s| s.combined).sum();
    Some(total as f64 / scores.len() as f64)
}

/// Order VMs heaviest first. Equal loads keep their enumeration order.
pub fn order_vms(mut vms: Vec<VmCandidate>, weights: &LoadWeights) -> Vec<VmCandidate> {
    vms.sort_by(|a, b| {
        b.load_score(weights)
            .partial_cmp(&a.load_score(weights))
            .unwrap_or(Ordering::Equal)
    });
    vms
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmshift_core::{HostStats, PowerState, VmStats};

    const MODEL: &str = "Intel(R) Xeon(R) Gold 6248 CPU @ 2.50GHz";

    fn make_host(name: &str, cpu: u64, mem: u64) -> HostCandidate {
        HostCandidate {
            name: name.to_string(),
            cluster: "prod".to_string(),
            cpu_model: Some(MODEL.to_string()),
            stats: Some(HostStats {
                cpu_used_mhz: cpu,
                memory_used_mb: mem,
                cpu_capacity_mhz: 1000,
                memory_total_mb: 1000,
            }),
            in_maintenance: false,
            status: HostStatus::Green,
            connection: ConnectionState::Connected,
            config_issues: Vec::new(),
        }
    }

    fn make_vm(name: &str, cpu: u64, mem: u64) -> VmCandidate {
        VmCandidate {
            name: name.to_string(),
            host: "esx-1".to_string(),
            stats: Some(VmStats {
                cpu_usage_mhz: cpu,
                guest_memory_mb: mem,
            }),
            power_state: PowerState::PoweredOn,
        }
    }

    fn names(ranked: &[HostScore]) -> Vec<&str> {
        ranked.iter().map(HostScore::name).collect()
    }

    #[test]
    fn rejects_maintenance_host() {
        let mut host = make_host("esx-2", 0, 0);
        host.in_maintenance = true;
        assert_eq!(eligibility(&host, MODEL), Err(Ineligible::Maintenance));
    }

    #[test]
    fn rejects_disconnected_host() {
        let mut host = make_host("esx-2", 0, 0);
        host.connection = ConnectionState::NotResponding;
        assert_eq!(
            eligibility(&host, MODEL),
            Err(Ineligible::Disconnected(ConnectionState::NotResponding))
        );
    }

    #[test]
    fn rejects_unhealthy_host() {
        let mut host = make_host("esx-2", 0, 0);
        host.status = HostStatus::Yellow;
        assert_eq!(
            eligibility(&host, MODEL),
            Err(Ineligible::Unhealthy(HostStatus::Yellow))
        );
    }

    #[test]
    fn cpu_model_must_match_exactly() {
        let host = make_host("esx-2", 0, 0);
        assert!(eligibility(&host, MODEL).is_ok());
        assert_eq!(
            eligibility(&host, "Intel(R) Xeon(R) Gold 6248 CPU @ 2.50GHz "),
            Err(Ineligible::CpuModelMismatch)
        );

        let mut unknown = make_host("esx-3", 0, 0);
        unknown.cpu_model = None;
        assert_eq!(eligibility(&unknown, MODEL), Err(Ineligible::MissingCpuModel));
    }

    #[test]
    fn score_requires_stats() {
        let mut host = make_host("esx-2", 100, 200);
        assert_eq!(score_host(&host).unwrap().combined, 200);
        host.stats = None;
        assert!(score_host(&host).is_none());
    }

    #[test]
    fn limits_are_strictly_greater_than() {
        let at = Utilization {
            cpu_pct: 75.0,
            memory_pct: 80.0,
        };
        assert!(!exceeds_limits(&at, 75, 80));
        let over = Utilization {
            cpu_pct: 75.1,
            memory_pct: 10.0,
        };
        assert!(exceeds_limits(&over, 75, 80));
    }

    #[test]
    fn rank_returns_lowest_combined_first() {
        let source = make_host("esx-0", 0, 0);
        let hosts = vec![
            make_host("esx-a", 50, 0),
            make_host("esx-b", 30, 0),
            make_host("esx-c", 40, 0),
        ];

        let ranked = rank_hosts(hosts, &source, &PlacementPolicy::default());
        assert_eq!(names(&ranked), vec!["esx-b", "esx-c", "esx-a"]);
        assert_eq!(ranked[0].combined, 30);
    }

    #[test]
    fn ties_break_by_host_name() {
        let source = make_host("esx-0", 0, 0);
        let hosts = vec![make_host("esx-z", 10, 0), make_host("esx-m", 10, 0)];

        let ranked = rank_hosts(hosts, &source, &PlacementPolicy::default());
        assert_eq!(names(&ranked), vec!["esx-m", "esx-z"]);
    }

    #[test]
    fn source_excluded_unless_rebalancing() {
        let source = make_host("esx-1", 0, 0);
        let hosts = vec![source.clone(), make_host("esx-2", 500, 0)];

        let ranked = rank_hosts(hosts.clone(), &source, &PlacementPolicy::default());
        assert_eq!(names(&ranked), vec!["esx-2"]);

        let policy = PlacementPolicy::default().with_rebalance(true);
        let ranked = rank_hosts(hosts, &source, &policy);
        assert_eq!(names(&ranked), vec!["esx-1", "esx-2"]);
    }

    #[test]
    fn limits_drop_busy_hosts_only_when_enforced() {
        let source = make_host("esx-0", 0, 0);
        // 900/1000 MHz = 90% cpu.
        let hosts = vec![make_host("busy", 900, 0), make_host("idle", 100, 900)];

        let ranked = rank_hosts(hosts.clone(), &source, &PlacementPolicy::default());
        assert!(ranked.is_empty(), "idle has 90% memory, busy has 90% cpu");

        let policy = PlacementPolicy::default().with_enforce_limits(false);
        let ranked = rank_hosts(hosts, &source, &policy);
        assert_eq!(names(&ranked), vec!["idle", "busy"]);
    }

    #[test]
    fn source_without_model_has_no_targets() {
        let mut source = make_host("esx-0", 0, 0);
        source.cpu_model = None;
        let ranked = rank_hosts(vec![make_host("esx-1", 0, 0)], &source, &PlacementPolicy::default());
        assert!(ranked.is_empty());
    }

    #[test]
    fn average_of_scores() {
        let source = make_host("esx-0", 0, 0);
        let ranked = rank_hosts(
            vec![make_host("a", 10, 0), make_host("b", 20, 0), make_host("c", 60, 0)],
            &source,
            &PlacementPolicy::default(),
        );
        assert_eq!(average_score(&ranked), Some(30.0));
        assert_eq!(average_score(&[]), None);
    }

    #[test]
    fn vms_ordered_heaviest_first() {
        // Load with default weights is (cpu + mem) / 2.
        let vms = vec![make_vm("a", 10, 10), make_vm("b", 30, 30), make_vm("c", 20, 20)];
        let ordered = order_vms(vms, &LoadWeights::default());
        let order: Vec<&str> = ordered.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn equal_vm_loads_keep_enumeration_order() {
        let vms = vec![make_vm("first", 5, 5), make_vm("second", 5, 5), make_vm("big", 50, 0)];
        let ordered = order_vms(vms, &LoadWeights::default());
        let order: Vec<&str> = ordered.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(order, vec!["big", "first", "second"]);
    }
}

//! vmshift placement advisor — greedy least-utilized host selection.
//!
//! This crate decides where VMs should run and drives the moves through the
//! collaborators defined in `vmshift-inventory`. It holds no state between
//! calls: every selection re-reads live host stats.
//!
//! # Components
//!
//! - **`scorer`** — eligibility, combined score, limit checks, VM ordering
//! - **`policy`** — `PlacementPolicy` (rebalance, limits, skip list, weights)
//! - **`advisor`** — target selection and single-VM migration
//! - **`batch`** — fail-fast migration of a host's VMs, heaviest first
//! - **`rebalance`** — round-robin bulk rebalance onto below-average hosts
//! - **`maintenance`** — maintenance mode, host evacuation, reboot and reconnect
//! - **`cleanup`** — unknown (orphaned) VM discovery and removal
//! - **`health`** — cluster health report

pub mod advisor;
pub mod batch;
pub mod cleanup;
pub mod error;
pub mod health;
pub mod maintenance;
pub mod policy;
pub mod rebalance;
pub mod scorer;

pub use advisor::{Advisor, MigrationOutcome, Move, PlacementOutcome};
pub use batch::{MigrationReport, TerminationReason};
pub use cleanup::{CleanupFailure, CleanupReport, UNKNOWN_VM_MARKER};
pub use error::{PlacementError, PlacementResult};
pub use health::{HealthReport, HostProblem};
pub use maintenance::{EvacuationReport, MaintenanceOutcome, MaintenanceStep, ReconnectOutcome};
pub use policy::PlacementPolicy;
pub use scorer::{HostScore, Ineligible, exceeds_limits, order_vms, rank_hosts, score_host};

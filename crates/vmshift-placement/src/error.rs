//! Placement error types.

use thiserror::Error;

use vmshift_inventory::InventoryError;

use crate::advisor::Move;

/// Errors that can occur while selecting targets or migrating VMs.
///
/// "No eligible target" and "already on the best host" are outcomes, not
/// errors; see [`crate::PlacementOutcome`].
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(#[from] InventoryError),

    #[error("migration of {vm} failed: {reason}")]
    MigrationFailed { vm: String, reason: String },

    #[error("maintenance mode change on {host} failed: {reason}")]
    MaintenanceFailed { host: String, reason: String },

    #[error("{action} of {host} failed: {reason}")]
    HostTaskFailed {
        host: String,
        action: &'static str,
        reason: String,
    },

    #[error("{0} must be in maintenance mode first")]
    NotInMaintenance(String),

    #[error("vm not found: {0}")]
    VmNotFound(String),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("{name} must be between 0 and 100, got {value}")]
    InvalidLimit { name: &'static str, value: u32 },

    #[error("batch aborted after {} migrations: {source}", .migrated.len())]
    BatchAborted {
        migrated: Vec<Move>,
        source: Box<PlacementError>,
    },
}

pub type PlacementResult<T> = Result<T, PlacementError>;

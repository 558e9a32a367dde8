//! Error types for inventory access and platform tasks.

use thiserror::Error;

/// Result type alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors raised while reading or writing the inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("inventory lock poisoned")]
    Lock,
}

/// Terminal failure of a platform task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task did not finish within {0:?}")]
    Timeout(std::time::Duration),

    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

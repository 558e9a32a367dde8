//! vmshift-inventory — the control-plane side of vmshift.
//!
//! Defines the two collaborators the placement advisor is written against,
//! and ships one implementation of both backed by a JSON cluster snapshot.
//!
//! # Components
//!
//! - **`provider`** — `InventoryProvider` and `MigrationExecutor` traits
//! - **`task`** — platform task handles and the blocking `wait_for_task` poll
//! - **`snapshot`** — `SnapshotInventory`, a file-backed simulated cluster
//! - **`error`** — inventory and task error types

pub mod error;
pub mod provider;
pub mod snapshot;
pub mod task;

pub use error::{InventoryError, InventoryResult, TaskError};
pub use provider::{InventoryProvider, MigrationExecutor};
pub use snapshot::{ClusterSnapshot, SnapshotInventory};
pub use task::{PollSettings, Task, TaskBackend, TaskExecutor, TaskState, wait_for_task};

pub mod config;
pub mod types;

pub use config::{ConfigError, ShiftConfig};
pub use types::*;

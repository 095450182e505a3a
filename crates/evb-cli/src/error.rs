//! Top-level error type. Every per-crate error gets exactly one `#[from]`
//! arm here; nothing below the CLI boundary should need to know about this
//! type.

use evb_core::ConfigError;
use evb_scheduler::SchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("{0}")]
    Other(String),
}

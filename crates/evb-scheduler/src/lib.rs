//! Dataset loading, scheduling, locking, persistence, and the per-pair
//! evaluation worker that together drive one harness run end to end.

pub mod dataset;
pub mod error;
pub mod lock;
pub mod persistence;
pub mod plan;
pub mod run;
pub mod signal;
pub mod state;
pub mod worker;

pub use dataset::*;
pub use error::*;
pub use lock::*;
pub use persistence::*;
pub use plan::*;
pub use run::*;
pub use signal::*;
pub use state::*;
pub use worker::*;

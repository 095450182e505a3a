pub mod bollard_runtime;
pub mod error;
pub mod manager;
pub mod runtime_trait;
pub mod types;

pub use bollard_runtime::*;
pub use error::*;
pub use manager::*;
pub use runtime_trait::*;
pub use types::*;

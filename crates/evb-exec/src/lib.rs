pub mod error;
pub mod local;
pub mod trait_def;
pub mod types;

pub use error::*;
pub use local::*;
pub use trait_def::*;
pub use types::*;

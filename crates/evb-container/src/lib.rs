pub mod container_exec;
pub mod discover;
pub mod error;
pub mod git;
pub mod operator;
pub mod run_tests;
pub mod selectors;

pub use container_exec::*;
pub use discover::*;
pub use error::*;
pub use git::*;
pub use operator::*;
pub use run_tests::*;
pub use selectors::*;

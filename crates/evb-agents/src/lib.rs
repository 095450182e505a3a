pub mod driver;
pub mod error;
pub mod tokens;
pub mod types;

pub use driver::*;
pub use error::*;
pub use tokens::*;
pub use types::*;

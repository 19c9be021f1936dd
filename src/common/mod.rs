pub mod errors;
pub mod notices;
pub mod types;

pub use errors::*;
pub use notices::*;
pub use types::*;

pub mod parser;
pub mod repository;
pub mod types;

pub use parser::*;
pub use repository::{Repository, ResolutionStage};
pub use types::*;

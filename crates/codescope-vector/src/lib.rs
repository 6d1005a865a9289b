pub mod ollama;
pub mod similarity;

pub use ollama::*;
pub use similarity::*;

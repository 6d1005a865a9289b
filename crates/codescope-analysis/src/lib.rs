pub mod assembler;
pub mod entry_points;
pub mod impact;
pub mod intent;

pub use assembler::*;
pub use entry_points::*;
pub use impact::*;
pub use intent::*;

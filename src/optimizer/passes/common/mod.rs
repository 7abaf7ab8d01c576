//! Passes usable by every backend.

pub mod dead_code_elimination;
pub mod divide_to_multiply;

pub use dead_code_elimination::DeadCodeElimination;
pub use divide_to_multiply::DivideToMultiply;

pub mod common;
pub mod nn_backend;
pub mod pass;
#[cfg(test)]
mod test_helpers;

pub use common::{DeadCodeElimination, DivideToMultiply};
pub use nn_backend::{AlertReturnTypeCast, ImplicitCast, implicit_casts};
pub use pass::Pass;

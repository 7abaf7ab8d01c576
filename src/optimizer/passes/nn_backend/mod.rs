//! Checks for programs lowered to the neural network backend.

pub mod alert_return_type_cast;

pub use alert_return_type_cast::{AlertReturnTypeCast, ImplicitCast, implicit_casts};

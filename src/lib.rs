pub mod cli;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod optimizer;
pub mod verification;

pub use error::{Error, Result};

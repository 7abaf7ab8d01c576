//! A small arithmetic language for building programs from text.
//!
//! ```text
//! y = x / 4.0;
//! z = cond(y > 1, y, x);
//! cast(z, fp16)
//! ```

pub mod lower;
pub mod parser;
pub mod tokenizer;

use crate::error::{Error, Result};
use crate::ir::Program;
use parser::Parser;
use tokenizer::Tokenizer;

pub(crate) fn parse_error(message: impl Into<String>, position: usize) -> Error {
    Error::Parse {
        message: message.into(),
        position,
    }
}

/// Tokenizes, parses and lowers `source` into a program with one function,
/// `main`.
pub fn compile(source: &str) -> Result<Program> {
    let lexemes = Tokenizer::tokenize(source)?;
    let statements = Parser::parse(&lexemes)?;
    lower::lower(&statements)
}

use crate::error::Result;
use crate::ir::Program;

/// A graph transformation that edits a [`Program`] in place.
///
/// Passes live in a shared registry, so they hold no per-run state.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, program: &mut Program) -> Result<()>;
}

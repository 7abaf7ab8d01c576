pub mod passes;
pub mod registry;

use tracing::{debug, debug_span};

use crate::error::Result;
use crate::ir::Program;
use crate::verification;
use registry::PassRegistry;

/// Passes run by [`Optimizer::run_all`], in order.
pub const DEFAULT_PIPELINE: [&str; 3] = [
    "common::divide_to_multiply",
    "common::dead_code_elimination",
    "nn_backend::alert_return_type_cast",
];

/// Runs registered passes over a program, in the order given.
pub struct Optimizer<'r> {
    registry: &'r PassRegistry,
    verify: bool,
}

impl<'r> Optimizer<'r> {
    pub fn new(registry: &'r PassRegistry) -> Self {
        Self {
            registry,
            verify: false,
        }
    }

    /// Validate the program after every pass.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Runs the named passes once each. Every identifier is resolved before
    /// the first pass runs, so an unknown name leaves the program untouched.
    pub fn run<S: AsRef<str>>(&self, program: &mut Program, passes: &[S]) -> Result<()> {
        let mut resolved = Vec::with_capacity(passes.len());
        for identifier in passes {
            let identifier = identifier.as_ref();
            resolved.push((identifier, self.registry.lookup(identifier)?));
        }

        for (identifier, pass) in resolved {
            let _span = debug_span!("pass", id = identifier).entered();
            pass.run(program)?;
            if self.verify {
                verification::validate(program)?;
            }
            debug!("pass finished");
        }
        Ok(())
    }

    pub fn run_all(&self, program: &mut Program) -> Result<()> {
        self.run(program, &DEFAULT_PIPELINE)
    }
}

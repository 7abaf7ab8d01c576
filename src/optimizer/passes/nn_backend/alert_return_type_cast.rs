use tracing::warn;

use crate::error::Result;
use crate::ir::{DType, Program};

use crate::optimizer::passes::pass::Pass;

/// A function output that a backend will silently cast to fp32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitCast {
    pub function: String,
    pub var: String,
    pub dtype: DType,
}

/// Outputs of every function, in program order, whose element type is not
/// fp32.
pub fn implicit_casts(program: &Program) -> Vec<ImplicitCast> {
    let mut casts = Vec::new();
    for function in program.functions() {
        for output in program.block(function.body()).outputs() {
            let var = program.var(*output);
            let dtype = var.ty().dtype();
            if dtype != DType::Fp32 {
                casts.push(ImplicitCast {
                    function: function.name().to_string(),
                    var: var.name().to_string(),
                    dtype,
                });
            }
        }
    }
    casts
}

/// Warns about function outputs that are not fp32. Never edits the program.
pub struct AlertReturnTypeCast;

impl Pass for AlertReturnTypeCast {
    fn name(&self) -> &'static str {
        "alert_return_type_cast"
    }

    fn run(&self, program: &mut Program) -> Result<()> {
        for cast in implicit_casts(program) {
            warn!(
                var = %cast.var,
                dtype = %cast.dtype,
                function = %cast.function,
                "output var {} of type {} in function {} is cast to type fp32",
                cast.var,
                cast.dtype,
                cast.function
            );
        }
        Ok(())
    }
}

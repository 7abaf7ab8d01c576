//! Use/def consistency checks for a [`Program`].
//!
//! Passes never call this themselves; the optimizer runs it between passes
//! when verification is enabled, and tests run it after every rewrite.

use crate::error::Result;
use crate::invariant_violation;
use crate::ir::{BlockId, Program};

/// Checks every function of `program`.
///
/// Fails on the first of: a removed op still listed in a block, an input
/// that is out of scope or produced by a removed op, consumer lists that
/// disagree with op inputs, outputs that do not point back at their
/// producer, or block outputs that are not visible.
pub fn validate(program: &Program) -> Result<()> {
    for function in program.functions() {
        validate_block(program, function.body())?;
    }
    Ok(())
}

fn validate_block(program: &Program, block: BlockId) -> Result<()> {
    let current = program.block(block);
    let mut visible = program.visible_vars(block, 0)?;

    for op_id in current.operations() {
        let op = program.op(*op_id).map_err(|_| {
            invariant_violation!(
                "block '{}' still lists removed op {:?}",
                current.name(),
                op_id
            )
        })?;
        if op.enclosing_block() != block {
            return Err(invariant_violation!(
                "op '{}' is listed in block '{}' but points at another block",
                op.name(),
                current.name()
            ));
        }

        for (key, var_id) in op.inputs() {
            let var = program.var(*var_id);
            if let Some(producer) = var.producer() {
                if !program.is_live(producer) {
                    return Err(invariant_violation!(
                        "op '{}' input {}=%{} is produced by a removed op",
                        op.name(),
                        key,
                        var.name()
                    ));
                }
            }
            if !visible.contains(var_id) {
                return Err(invariant_violation!(
                    "op '{}' input {}=%{} is not visible in block '{}'",
                    op.name(),
                    key,
                    var.name(),
                    current.name()
                ));
            }
            let uses = op.inputs().values().filter(|v| *v == var_id).count();
            let recorded = var.consumers().iter().filter(|c| *c == op_id).count();
            if uses != recorded {
                return Err(invariant_violation!(
                    "var '%{}' is used {} times by op '{}' but records {} uses",
                    var.name(),
                    uses,
                    op.name(),
                    recorded
                ));
            }
        }

        for nested in op.blocks() {
            if program.block(*nested).outer_op() != Some(*op_id) {
                return Err(invariant_violation!(
                    "block '{}' does not point back at op '{}'",
                    program.block(*nested).name(),
                    op.name()
                ));
            }
            validate_block(program, *nested)?;
        }

        for output in op.outputs() {
            let var = program.var(*output);
            if var.producer() != Some(*op_id) {
                return Err(invariant_violation!(
                    "output '%{}' of op '{}' has another producer",
                    var.name(),
                    op.name()
                ));
            }
            for consumer in var.consumers() {
                let user = program.op(*consumer).map_err(|_| {
                    invariant_violation!("var '%{}' is consumed by a removed op", var.name())
                })?;
                if !user.inputs().values().any(|v| v == output) {
                    return Err(invariant_violation!(
                        "var '%{}' lists op '{}' as consumer but it does not use it",
                        var.name(),
                        user.name()
                    ));
                }
            }
            visible.insert(*output);
        }
    }

    for output in current.outputs() {
        let var = program.var(*output);
        if !visible.contains(output) {
            return Err(invariant_violation!(
                "output '%{}' of block '{}' is not visible",
                var.name(),
                current.name()
            ));
        }
        if !var.consuming_blocks().contains(&block) {
            return Err(invariant_violation!(
                "output '%{}' does not record block '{}'",
                var.name(),
                current.name()
            ));
        }
    }

    Ok(())
}

use tracing::debug;

use crate::error::Result;
use crate::ir::{BlockId, OpId, Program, Value};

use crate::optimizer::passes::pass::Pass;

/// Divide to Multiply Pass
///
/// Rewrites `real_div(x, y)` with a constant `y` into `mul(x, 1 / y)`:
/// - the reciprocal becomes a new `const` op named `_inversed_<op>_y`
/// - the multiply is named `_inversed_<op>` and takes over every later use
///   of the division's output
///
/// Nested blocks are rewritten before their owning op is looked at. Only
/// float divisions are rewritten: the dividend and the quotient must have a
/// float dtype. Booleans have no reciprocal and are left alone; an integer
/// constant divisor is promoted to float.
pub struct DivideToMultiply;

impl DivideToMultiply {
    fn rewrite_block(program: &mut Program, block: BlockId) -> Result<usize> {
        let mut rewritten = 0;
        // Ops inserted during the walk are not visited.
        let ops = program.block(block).operations().to_vec();

        for op_id in ops {
            if !program.is_live(op_id) {
                continue;
            }
            let nested = program.op(op_id)?.blocks().to_vec();
            for nested_block in &nested {
                rewritten += Self::rewrite_block(program, *nested_block)?;
            }
            if !nested.is_empty() {
                continue;
            }
            if Self::try_rewrite(program, block, op_id)? {
                rewritten += 1;
            }
        }

        Ok(rewritten)
    }

    fn try_rewrite(program: &mut Program, block: BlockId, op_id: OpId) -> Result<bool> {
        let op = program.op(op_id)?;
        if op.op_type() != "real_div" {
            return Ok(false);
        }
        let (Some(x), Some(y)) = (op.input("x"), op.input("y")) else {
            return Ok(false);
        };
        let quotient = op.output();
        let float_division = program.var(x).ty().dtype().is_float()
            && program.var(quotient).ty().dtype().is_float();
        if !float_division {
            return Ok(false);
        }
        let Some(inverse) = program.var(y).value().and_then(Value::reciprocal) else {
            return Ok(false);
        };

        let name = op.name().to_string();
        let ty = program.var(quotient).ty().clone();

        let mul_name = program.fresh_op_name(block, &format!("_inversed_{name}"));
        let const_name = program.fresh_op_name(block, &format!("{mul_name}_y"));
        let inverse = program.insert_const_before(block, op_id, &const_name, inverse)?;
        let mul = program.insert_op_before(
            block,
            op_id,
            &mul_name,
            "mul",
            &[("x", x), ("y", inverse)],
            &[ty],
        )?;
        let product = program.op(mul)?.output();

        program.replace_uses_of_var_after_op(block, Some(op_id), quotient, product)?;
        program.remove_op(op_id)?;

        debug!(op = %name, mul = %mul_name, "replaced real_div with mul");
        Ok(true)
    }
}

impl Pass for DivideToMultiply {
    fn name(&self) -> &'static str {
        "divide_to_multiply"
    }

    fn run(&self, program: &mut Program) -> Result<()> {
        for body in program.function_bodies() {
            let rewritten = Self::rewrite_block(program, body)?;
            debug!(rewritten, "divide_to_multiply finished function body");
        }
        Ok(())
    }
}

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;
use crate::ir::{BlockId, Program, VarId};

use crate::optimizer::passes::pass::Pass;

/// Dead code elimination optimization pass
///
/// This pass removes operations that don't contribute to a block's outputs.
/// Liveness flows backwards from the outputs; a kept op also keeps whatever
/// its nested blocks need, including vars from enclosing scopes.
pub struct DeadCodeElimination;

impl DeadCodeElimination {
    /// Cleans `block` and returns every var it still reads.
    fn eliminate_block(program: &mut Program, block: BlockId) -> Result<HashSet<VarId>> {
        let mut used: HashSet<VarId> = program.block(block).outputs().iter().copied().collect();
        let mut dead = Vec::new();

        let ops = program.block(block).operations().to_vec();
        for op_id in ops.into_iter().rev() {
            let op = program.op(op_id)?;
            if !op.outputs().iter().any(|v| used.contains(v)) {
                dead.push(op_id);
                continue;
            }
            used.extend(op.inputs().values().copied());

            let nested = op.blocks().to_vec();
            for nested_block in nested {
                used.extend(Self::eliminate_block(program, nested_block)?);
            }
        }

        if !dead.is_empty() {
            debug!(
                block = program.block(block).name(),
                removed = dead.len(),
                "removing dead ops"
            );
            program.remove_ops(&dead)?;
        }
        Ok(used)
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead_code_elimination"
    }

    fn run(&self, program: &mut Program) -> Result<()> {
        for body in program.function_bodies() {
            Self::eliminate_block(program, body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::passes::test_helpers::*;
    use crate::verification::validate;

    #[test]
    fn test_basic_dce() {
        let (mut program, body, inputs) = create_test_program(&["x"]);
        let c = cnst(&mut program, body, "c", 2.0);
        let _unused = cnst(&mut program, body, "unused", 999.0);
        let y = binop(&mut program, body, "y", "mul", inputs[0], c);
        program.set_outputs(body, &[y]).unwrap();

        DeadCodeElimination.run(&mut program).unwrap();

        assert_eq!(op_names(&program, body), vec!["c", "y"]);
        assert!(validate(&program).is_ok());
    }

    #[test]
    fn test_dce_chain() {
        let (mut program, body, inputs) = create_test_program(&["x"]);
        let c = cnst(&mut program, body, "c", 2.0);
        let a = binop(&mut program, body, "a", "add", inputs[0], c);
        let _b = binop(&mut program, body, "b", "mul", a, a);
        program.set_outputs(body, &[inputs[0]]).unwrap();

        DeadCodeElimination.run(&mut program).unwrap();

        assert!(program.block(body).operations().is_empty());
        assert!(program.var(inputs[0]).consumers().is_empty());
        assert!(validate(&program).is_ok());
    }

    #[test]
    fn test_dce_keeps_values_used_by_nested_blocks() {
        let (mut program, body, inputs) = create_test_program(&["x"]);
        let x = inputs[0];
        let c = cnst(&mut program, body, "c", 3.0);
        let only_nested = cnst(&mut program, body, "only_dead_nested", 5.0);
        let outer = program
            .append_op(body, "branch", "cond", &[("pred", x)], &[fp32()])
            .unwrap();
        let then_block = program.add_nested_block(outer, "then", &[]).unwrap();
        let _dead = binop(&mut program, then_block, "dead", "add", x, only_nested);
        let kept = binop(&mut program, then_block, "kept", "mul", x, c);
        program.set_outputs(then_block, &[kept]).unwrap();
        let result = program.op(outer).unwrap().output();
        program.set_outputs(body, &[result]).unwrap();

        DeadCodeElimination.run(&mut program).unwrap();

        assert_eq!(op_names(&program, then_block), vec!["kept"]);
        assert_eq!(op_names(&program, body), vec!["c", "branch"]);
        assert!(validate(&program).is_ok());
    }

    #[test]
    fn test_dce_removes_dead_nested_owner() {
        let (mut program, body, inputs) = create_test_program(&["x"]);
        let x = inputs[0];
        let outer = program
            .append_op(body, "branch", "cond", &[("pred", x)], &[fp32()])
            .unwrap();
        let then_block = program.add_nested_block(outer, "then", &[]).unwrap();
        let inner = binop(&mut program, then_block, "inner", "add", x, x);
        program.set_outputs(then_block, &[inner]).unwrap();
        program.set_outputs(body, &[x]).unwrap();

        DeadCodeElimination.run(&mut program).unwrap();

        assert!(program.block(body).operations().is_empty());
        assert!(!program.is_live(program.var(inner).producer().unwrap()));
        assert!(program.var(x).consumers().is_empty());
    }
}

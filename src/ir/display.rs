use std::fmt;

use crate::ir::{BlockId, Operation, Program, VarId};

const INDENT: &str = "  ";

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in self.functions.values() {
            self.fmt_block(f, function.body, 0)?;
        }
        Ok(())
    }
}

impl Program {
    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId, depth: usize) -> fmt::Result {
        let indent = INDENT.repeat(depth);
        let current = &self.blocks[block.0];

        let inputs: Vec<String> = current.inputs.iter().map(|v| self.fmt_decl(*v)).collect();
        writeln!(f, "{indent}{}({}) {{", current.name, inputs.join(", "))?;
        for op_id in &current.operations {
            if let Some(op) = &self.ops[op_id.0] {
                self.fmt_op(f, op, depth + 1)?;
            }
        }
        let outputs: Vec<String> = current
            .outputs
            .iter()
            .map(|v| format!("%{}", self.vars[v.0].name))
            .collect();
        writeln!(f, "{indent}}} -> ({})", outputs.join(", "))
    }

    fn fmt_op(&self, f: &mut fmt::Formatter<'_>, op: &Operation, depth: usize) -> fmt::Result {
        let indent = INDENT.repeat(depth);
        let outputs: Vec<String> = op.outputs.iter().map(|v| self.fmt_decl(*v)).collect();

        let const_value = match op.op_type.as_str() {
            "const" => self.vars[op.output().0].value.as_ref(),
            _ => None,
        };
        let args: Vec<String> = match const_value {
            Some(value) => vec![format!("val={value}")],
            None => op
                .inputs
                .iter()
                .map(|(key, var)| format!("{key}=%{}", self.vars[var.0].name))
                .collect(),
        };

        write!(
            f,
            "{indent}{} = {}({})",
            outputs.join(", "),
            op.op_type,
            args.join(", ")
        )?;
        if op.blocks.is_empty() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for nested in &op.blocks {
            self.fmt_block(f, *nested, depth + 1)?;
        }
        writeln!(f, "{indent}}}")
    }

    fn fmt_decl(&self, var: VarId) -> String {
        let var = &self.vars[var.0];
        format!("%{}: {}", var.name, var.ty)
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Program, Value, VarType};

    #[test]
    fn test_display_nested() {
        let mut program = Program::new();
        let body = program.add_function("main", &[("x", VarType::fp32())]).unwrap();
        let x = program.block(body).inputs()[0];
        let c = program.append_const(body, "c", Value::Float(0.5)).unwrap();
        let outer = program
            .append_op(body, "loop", "while_loop", &[("x", x)], &[VarType::fp32()])
            .unwrap();
        let nested = program
            .add_nested_block(outer, "loop_body", &[("x.x", VarType::fp32())])
            .unwrap();
        let carried = program.block(nested).inputs()[0];
        let inner = program
            .append_op(nested, "step", "mul", &[("x", carried), ("y", c)], &[VarType::fp32()])
            .unwrap();
        let step = program.op(inner).unwrap().output();
        program.set_outputs(nested, &[step]).unwrap();
        let result = program.op(outer).unwrap().output();
        program.set_outputs(body, &[result]).unwrap();

        let expected = "\
main(%x: fp32) {
  %c: fp32 = const(val=0.5)
  %loop: fp32 = while_loop(x=%x) {
    loop_body(%x.x: fp32) {
      %step: fp32 = mul(x=%x.x, y=%c)
    } -> (%step)
  }
} -> (%loop)
";
        assert_eq!(program.to_string(), expected);
    }
}

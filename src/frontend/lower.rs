//! Lowering of parsed statements into a single-function [`Program`].

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::debug;

use crate::error::Result;
use crate::frontend::parse_error;
use crate::frontend::parser::{Expr, Stmt};
use crate::invariant_violation;
use crate::ir::{BlockId, DType, Program, Value, VarId, VarType};

pub const ENTRY_FUNCTION: &str = "main";

/// Builds function `main` from `statements`. Names read before they are
/// assigned become fp32 inputs, in order of first use; the value of the
/// final expression statement is the only output.
pub fn lower(statements: &[Stmt]) -> Result<Program> {
    let inputs = free_names(statements);
    let typed: Vec<(&str, VarType)> = inputs
        .iter()
        .map(|name| (name.as_str(), VarType::fp32()))
        .collect();

    let mut program = Program::new();
    let body = program.add_function(ENTRY_FUNCTION, &typed)?;
    let scope = inputs
        .iter()
        .cloned()
        .zip(program.block(body).inputs().iter().copied())
        .collect();

    let mut lowering = Lowering {
        program,
        scope,
        constants: 0,
        temporaries: 0,
    };

    let mut result = None;
    for statement in statements {
        match statement {
            Stmt::Assign { name, value } => {
                let var = lowering.expr(body, value, Some(name))?;
                lowering.scope.insert(name.clone(), var);
            }
            Stmt::Expr(expr) => result = Some(lowering.expr(body, expr, None)?),
        }
    }

    let Some(output) = result else {
        return Err(parse_error("program must end with an expression", 0));
    };
    lowering.program.set_outputs(body, &[output])?;
    debug!(inputs = inputs.len(), "lowered program");
    Ok(lowering.program)
}

fn free_names(statements: &[Stmt]) -> IndexSet<String> {
    let mut assigned = HashSet::new();
    let mut free = IndexSet::new();
    for statement in statements {
        match statement {
            Stmt::Assign { name, value } => {
                collect_free(value, &assigned, &mut free);
                assigned.insert(name.clone());
            }
            Stmt::Expr(expr) => collect_free(expr, &assigned, &mut free),
        }
    }
    free
}

fn collect_free(expr: &Expr, assigned: &HashSet<String>, free: &mut IndexSet<String>) {
    match expr {
        Expr::Num(_) => {}
        Expr::Var(name) => {
            if !assigned.contains(name) {
                free.insert(name.clone());
            }
        }
        Expr::Binary(left, _, right) => {
            collect_free(left, assigned, free);
            collect_free(right, assigned, free);
        }
        Expr::Call { callee, args, .. } => {
            // the second argument of cast names a dtype
            let values = if callee == "cast" { &args[..args.len().min(1)] } else { &args[..] };
            for arg in values {
                collect_free(arg, assigned, free);
            }
        }
    }
}

struct Lowering {
    program: Program,
    scope: HashMap<String, VarId>,
    constants: usize,
    temporaries: usize,
}

impl Lowering {
    fn expr(&mut self, block: BlockId, expr: &Expr, hint: Option<&str>) -> Result<VarId> {
        match expr {
            Expr::Num(value) => {
                let name = match hint {
                    Some(hint) => self.program.fresh_op_name(block, hint),
                    None => self.next_name(block, 'c'),
                };
                self.program.append_const(block, &name, Value::Float(*value))
            }
            Expr::Var(name) => self
                .scope
                .get(name)
                .copied()
                .ok_or_else(|| invariant_violation!("unbound name '{}'", name)),
            Expr::Binary(left, op, right) => {
                let x = self.expr(block, left, None)?;
                let y = self.expr(block, right, None)?;
                let ty = if op.is_comparison() {
                    VarType::Scalar(DType::Bool)
                } else {
                    self.program.var(x).ty().clone()
                };
                let name = self.op_name(block, hint);
                let op = self
                    .program
                    .append_op(block, &name, op.op_type(), &[("x", x), ("y", y)], &[ty])?;
                Ok(self.program.op(op)?.output())
            }
            Expr::Call {
                callee,
                args,
                position,
            } => match (callee.as_str(), args.as_slice()) {
                ("cast", [value, Expr::Var(dtype)]) => {
                    let dtype = DType::parse(dtype).ok_or_else(|| {
                        parse_error(format!("unknown dtype '{dtype}'"), *position)
                    })?;
                    let x = self.expr(block, value, None)?;
                    let name = self.op_name(block, hint);
                    let op = self.program.append_op(
                        block,
                        &name,
                        "cast",
                        &[("x", x)],
                        &[VarType::Scalar(dtype)],
                    )?;
                    Ok(self.program.op(op)?.output())
                }
                ("cond", [pred, then_expr, else_expr]) => {
                    self.cond(block, pred, then_expr, else_expr, hint, *position)
                }
                ("cast", _) => Err(parse_error("cast takes (value, dtype)", *position)),
                ("cond", _) => Err(parse_error("cond takes (pred, then, else)", *position)),
                _ => Err(parse_error(format!("unknown function '{callee}'"), *position)),
            },
        }
    }

    // The cond op owns a `then` and an `else` block, each with one output.
    // Both branches must have the same type, which the result takes.
    fn cond(
        &mut self,
        block: BlockId,
        pred: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
        hint: Option<&str>,
        position: usize,
    ) -> Result<VarId> {
        let pred = self.expr(block, pred, None)?;
        let name = self.op_name(block, hint);
        let op = self
            .program
            .append_op(block, &name, "cond", &[("pred", pred)], &[VarType::fp32()])?;

        let then_block = self.program.add_nested_block(op, "then", &[])?;
        let then_value = self.expr(then_block, then_expr, None)?;
        self.program.set_outputs(then_block, &[then_value])?;

        let else_block = self.program.add_nested_block(op, "else", &[])?;
        let else_value = self.expr(else_block, else_expr, None)?;
        self.program.set_outputs(else_block, &[else_value])?;

        let then_ty = self.program.var(then_value).ty().clone();
        let else_ty = self.program.var(else_value).ty();
        if &then_ty != else_ty {
            return Err(parse_error(
                format!("cond branches differ in type: {then_ty} and {else_ty}"),
                position,
            ));
        }
        let output = self.program.op(op)?.output();
        self.program.set_var_type(output, then_ty);
        Ok(output)
    }

    fn op_name(&mut self, block: BlockId, hint: Option<&str>) -> String {
        match hint {
            Some(hint) => self.program.fresh_op_name(block, hint),
            None => self.next_name(block, 't'),
        }
    }

    fn next_name(&mut self, block: BlockId, prefix: char) -> String {
        let counter = match prefix {
            'c' => &mut self.constants,
            _ => &mut self.temporaries,
        };
        let base = format!("{prefix}{counter}");
        *counter += 1;
        self.program.fresh_op_name(block, &base)
    }
}

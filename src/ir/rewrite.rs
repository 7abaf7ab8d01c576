//! Graph surgery used by the passes: use/def repair, op removal and queries.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;
use crate::invariant_violation;
use crate::ir::{BlockId, OpId, Program, VarId, remove_one};

impl Program {
    /// Redirects every use of `old` that comes after `anchor` in `block` to
    /// `new`, including uses inside nested blocks and the block outputs.
    /// With no anchor the whole block is rewritten.
    ///
    /// The op producing `old` keeps producing it; only consumers move. When
    /// `old` is a function output, `new` takes over its name so the function
    /// signature does not change, unless `new` is a block input or already an
    /// output itself. Returns the number of ops affected.
    pub fn replace_uses_of_var_after_op(
        &mut self,
        block: BlockId,
        anchor: Option<OpId>,
        old: VarId,
        new: VarId,
    ) -> Result<usize> {
        let start = match anchor {
            Some(op) => self.position_in_block(block, op)? + 1,
            None => 0,
        };

        let visible = self.visible_vars(block, start)?;
        if !visible.contains(&new) {
            return Err(invariant_violation!(
                "new var '%{}' is not visible in block '{}' at the anchor",
                self.vars[new.0].name,
                self.blocks[block.0].name
            ));
        }
        if self.vars[old.0].ty != self.vars[new.0].ty {
            return Err(invariant_violation!(
                "cannot replace '%{}' of type {} with '%{}' of type {}",
                self.vars[old.0].name,
                self.vars[old.0].ty,
                self.vars[new.0].name,
                self.vars[new.0].ty
            ));
        }

        let affected = self.replace_var_in_block(block, start, old, new)?;
        debug!(
            old = %self.vars[old.0].name,
            new = %self.vars[new.0].name,
            affected,
            "replaced uses of var"
        );
        Ok(affected)
    }

    fn replace_var_in_block(
        &mut self,
        block: BlockId,
        start: usize,
        old: VarId,
        new: VarId,
    ) -> Result<usize> {
        let mut affected = 0;
        let ops: Vec<OpId> = self.blocks[block.0]
            .operations
            .iter()
            .skip(start)
            .copied()
            .collect();

        for op_id in ops {
            let op = self.op_mut(op_id)?;
            let mut uses = 0;
            for var in op.inputs.values_mut() {
                if *var == old {
                    *var = new;
                    uses += 1;
                }
            }
            let nested = op.blocks.clone();

            if uses > 0 {
                affected += 1;
                for _ in 0..uses {
                    remove_one(&mut self.vars[old.0].consumers, &op_id);
                    self.vars[new.0].consumers.push(op_id);
                }
            }
            for nested_block in nested {
                affected += self.replace_var_in_block(nested_block, 0, old, new)?;
            }
        }

        if self.blocks[block.0].outputs.contains(&old) {
            // Inputs and vars that already are outputs keep their own names.
            let rename = self.blocks[block.0].outer_op.is_none()
                && self.vars[new.0].producer.is_some()
                && !self.blocks[block.0].outputs.contains(&new);
            for output in self.blocks[block.0].outputs.iter_mut() {
                if *output == old {
                    *output = new;
                    remove_one(&mut self.vars[old.0].consuming_blocks, &block);
                    self.vars[new.0].consuming_blocks.push(block);
                }
            }
            if rename {
                self.vars[new.0].name = self.vars[old.0].name.clone();
            }
        }

        Ok(affected)
    }

    /// Deletes `op` from its block.
    ///
    /// Fails without touching the graph if any output still has a consumer or
    /// is a block output: uses have to be redirected first. Nested blocks are
    /// emptied before the op goes away.
    pub fn remove_op(&mut self, op_id: OpId) -> Result<()> {
        let op = self.op(op_id)?;
        for (i, output) in op.outputs.iter().enumerate() {
            let var = &self.vars[output.0];
            if !var.consumers.is_empty() {
                let users: Vec<&str> = var
                    .consumers
                    .iter()
                    .filter_map(|user| self.ops[user.0].as_ref())
                    .map(|user| user.name.as_str())
                    .collect();
                return Err(invariant_violation!(
                    "cannot delete op '{}' with active output at id {}: '{}' used by ops {:?}",
                    op.name,
                    i,
                    var.name,
                    users
                ));
            }
            if let Some(block) = var.consuming_blocks.first() {
                return Err(invariant_violation!(
                    "cannot delete op '{}' with output {}: '{}' that is an output of block '{}'",
                    op.name,
                    i,
                    var.name,
                    self.blocks[block.0].name
                ));
            }
        }

        let block = op.enclosing_block;
        let name = op.name.clone();
        let nested = op.blocks.clone();
        let inputs: Vec<VarId> = op.inputs.values().copied().collect();

        for nested_block in nested {
            self.set_outputs(nested_block, &[])?;
            let inner = self.blocks[nested_block.0].operations.clone();
            self.remove_ops(&inner)?;
        }

        let position = self.position_in_block(block, op_id)?;
        self.blocks[block.0].operations.remove(position);
        for input in inputs {
            remove_one(&mut self.vars[input.0].consumers, &op_id);
        }
        self.ops[op_id.0] = None;
        debug!(op = %name, "removed op");
        Ok(())
    }

    /// Deletes several ops of one block, later ops first so an op consumed
    /// only by other removed ops can go too.
    pub fn remove_ops(&mut self, ops: &[OpId]) -> Result<()> {
        let Some(first) = ops.first() else {
            return Ok(());
        };
        let block = self.op(*first)?.enclosing_block;

        let mut ordered = Vec::with_capacity(ops.len());
        for op in ops {
            if self.op(*op)?.enclosing_block != block {
                return Err(invariant_violation!(
                    "ops removed together must share block '{}'",
                    self.blocks[block.0].name
                ));
            }
            ordered.push((self.position_in_block(block, *op)?, *op));
        }
        ordered.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, op) in ordered {
            self.remove_op(op)?;
        }
        Ok(())
    }

    /// Ops in `block` and everything nested below it whose name starts with
    /// `prefix` and whose type is `op_type`. A missing filter matches all.
    pub fn find_ops(
        &self,
        block: BlockId,
        prefix: Option<&str>,
        op_type: Option<&str>,
    ) -> Result<Vec<OpId>> {
        let mut found = Vec::new();
        for op_id in &self.blocks[block.0].operations {
            let op = self.op(*op_id)?;
            let prefix_match = prefix.is_none_or(|p| op.name.starts_with(p));
            let type_match = op_type.is_none_or(|t| op.op_type == t);
            if prefix_match && type_match {
                found.push(*op_id);
            }
            for nested in &op.blocks {
                found.extend(self.find_ops(*nested, prefix, op_type)?);
            }
        }
        Ok(found)
    }

    /// Ops of `block` needed to compute `vars`, in block order. Nested blocks
    /// of a needed op count through their outputs.
    pub fn operations_for_vars(&self, block: BlockId, vars: &[VarId]) -> Result<Vec<OpId>> {
        let mut used: HashSet<VarId> = vars.iter().copied().collect();
        let mut needed = Vec::new();

        for op_id in self.blocks[block.0].operations.iter().rev() {
            let op = self.op(*op_id)?;
            if !op.outputs.iter().any(|v| used.contains(v)) {
                continue;
            }
            needed.push(*op_id);

            let mut to_check = Vec::new();
            for nested in &op.blocks {
                to_check.extend(self.operations_for_vars(*nested, &self.blocks[nested.0].outputs)?);
                used.extend(self.blocks[nested.0].outputs.iter().copied());
            }
            to_check.push(*op_id);
            for checked in to_check {
                used.extend(self.op(checked)?.inputs.values().copied());
            }
        }

        needed.reverse();
        Ok(needed)
    }
}

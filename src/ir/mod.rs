//! Program graph shared by every pass.
//!
//! A [`Program`] owns arenas of blocks, operations and variables. Everything
//! else refers to them through copyable handles, so an operation's inputs are
//! plain [`VarId`]s and deleting an operation only tombstones its slot:
//! handles are never reused, and a stale handle is detected instead of
//! silently pointing at a different operation.

pub mod display;
pub mod rewrite;

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::error::Result;
use crate::invariant_violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl OpId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Fp16,
    Fp32,
    Fp64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Fp16 => "fp16",
            DType::Fp32 => "fp32",
            DType::Fp64 => "fp64",
        }
    }

    pub fn parse(name: &str) -> Option<DType> {
        match name {
            "bool" => Some(DType::Bool),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "fp16" => Some(DType::Fp16),
            "fp32" => Some(DType::Fp32),
            "fp64" => Some(DType::Fp64),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::Fp16 | DType::Fp32 | DType::Fp64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    Scalar(DType),
    Tensor { dtype: DType, shape: Vec<usize> },
}

impl VarType {
    pub fn fp32() -> Self {
        VarType::Scalar(DType::Fp32)
    }

    pub fn dtype(&self) -> DType {
        match self {
            VarType::Scalar(dtype) => *dtype,
            VarType::Tensor { dtype, .. } => *dtype,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Scalar(dtype) => write!(f, "{dtype}"),
            VarType::Tensor { dtype, shape } => {
                let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
                write!(f, "{dtype}[{}]", dims.join(","))
            }
        }
    }
}

/// Materialized value of a constant variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    FloatTensor(Vec<f64>),
}

impl Value {
    /// Type a `const` op producing this value gets.
    pub fn ty(&self) -> VarType {
        match self {
            Value::Bool(_) => VarType::Scalar(DType::Bool),
            Value::Int(_) => VarType::Scalar(DType::Int32),
            Value::Float(_) => VarType::fp32(),
            Value::FloatTensor(values) => VarType::Tensor {
                dtype: DType::Fp32,
                shape: vec![values.len()],
            },
        }
    }

    /// `1.0 / self`, element-wise for tensors. Integers are promoted to
    /// float; booleans have no reciprocal.
    pub fn reciprocal(&self) -> Option<Value> {
        match self {
            Value::Bool(_) => None,
            Value::Int(v) => Some(Value::Float(1.0 / *v as f64)),
            Value::Float(v) => Some(Value::Float(1.0 / v)),
            Value::FloatTensor(values) => {
                Some(Value::FloatTensor(values.iter().map(|v| 1.0 / v).collect()))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::FloatTensor(values) => write!(f, "{values:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    name: String,
    ty: VarType,
    value: Option<Value>,
    producer: Option<OpId>,
    // one entry per input slot that references this var
    consumers: Vec<OpId>,
    consuming_blocks: Vec<BlockId>,
}

impl Var {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &VarType {
        &self.ty
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// `None` for block and function inputs.
    pub fn producer(&self) -> Option<OpId> {
        self.producer
    }

    pub fn consumers(&self) -> &[OpId] {
        &self.consumers
    }

    /// Blocks that list this var among their outputs.
    pub fn consuming_blocks(&self) -> &[BlockId] {
        &self.consuming_blocks
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    op_type: String,
    inputs: IndexMap<String, VarId>,
    outputs: Vec<VarId>,
    blocks: Vec<BlockId>,
    enclosing_block: BlockId,
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn inputs(&self) -> &IndexMap<String, VarId> {
        &self.inputs
    }

    pub fn input(&self, key: &str) -> Option<VarId> {
        self.inputs.get(key).copied()
    }

    #[cfg(test)]
    pub(crate) fn inputs_mut(&mut self) -> &mut IndexMap<String, VarId> {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &[VarId] {
        &self.outputs
    }

    /// First output. Every operation has at least one.
    pub fn output(&self) -> VarId {
        self.outputs[0]
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn enclosing_block(&self) -> BlockId {
        self.enclosing_block
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    inputs: Vec<VarId>,
    operations: Vec<OpId>,
    outputs: Vec<VarId>,
    outer_op: Option<OpId>,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[VarId] {
        &self.inputs
    }

    /// Operations in execution order.
    pub fn operations(&self) -> &[OpId] {
        &self.operations
    }

    pub fn outputs(&self) -> &[VarId] {
        &self.outputs
    }

    /// The op owning this block, `None` for a function body.
    pub fn outer_op(&self) -> Option<OpId> {
        self.outer_op
    }
}

/// A function is its body block: the block inputs are the function inputs
/// and the block outputs are the values the function returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    body: BlockId,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> BlockId {
        self.body
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    functions: IndexMap<String, Function>,
    blocks: Vec<Block>,
    ops: Vec<Option<Operation>>,
    vars: Vec<Var>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function whose body takes `inputs`, returning the body block.
    pub fn add_function(&mut self, name: &str, inputs: &[(&str, VarType)]) -> Result<BlockId> {
        if self.functions.contains_key(name) {
            return Err(invariant_violation!("function '{}' already exists", name));
        }
        let body = self.new_block(name, None, inputs);
        self.functions.insert(
            name.to_string(),
            Function {
                name: name.to_string(),
                body,
            },
        );
        Ok(body)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Functions in insertion order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Snapshot of every function body, for passes that mutate while
    /// walking the program.
    pub fn function_bodies(&self) -> Vec<BlockId> {
        self.functions.values().map(|f| f.body).collect()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0]
    }

    pub(crate) fn set_var_type(&mut self, id: VarId, ty: VarType) {
        self.vars[id.0].ty = ty;
    }

    pub fn op(&self, id: OpId) -> Result<&Operation> {
        self.ops
            .get(id.0)
            .and_then(|op| op.as_ref())
            .ok_or_else(|| invariant_violation!("op {:?} has been removed", id))
    }

    pub(crate) fn op_mut(&mut self, id: OpId) -> Result<&mut Operation> {
        self.ops
            .get_mut(id.0)
            .and_then(|op| op.as_mut())
            .ok_or_else(|| invariant_violation!("op {:?} has been removed", id))
    }

    pub fn is_live(&self, id: OpId) -> bool {
        matches!(self.ops.get(id.0), Some(Some(_)))
    }

    /// Appends an op at the end of `block`.
    pub fn append_op(
        &mut self,
        block: BlockId,
        name: &str,
        op_type: &str,
        inputs: &[(&str, VarId)],
        outputs: &[VarType],
    ) -> Result<OpId> {
        let position = self.blocks[block.0].operations.len();
        self.place_op(block, position, name, op_type, inputs, outputs, None)
    }

    /// Inserts an op immediately before `before` in `block`.
    pub fn insert_op_before(
        &mut self,
        block: BlockId,
        before: OpId,
        name: &str,
        op_type: &str,
        inputs: &[(&str, VarId)],
        outputs: &[VarType],
    ) -> Result<OpId> {
        let position = self.position_in_block(block, before)?;
        self.place_op(block, position, name, op_type, inputs, outputs, None)
    }

    pub fn append_const(&mut self, block: BlockId, name: &str, value: Value) -> Result<VarId> {
        let position = self.blocks[block.0].operations.len();
        let ty = value.ty();
        let op = self.place_op(block, position, name, "const", &[], &[ty], Some(value))?;
        Ok(self.op(op)?.output())
    }

    pub fn insert_const_before(
        &mut self,
        block: BlockId,
        before: OpId,
        name: &str,
        value: Value,
    ) -> Result<VarId> {
        let position = self.position_in_block(block, before)?;
        let ty = value.ty();
        let op = self.place_op(block, position, name, "const", &[], &[ty], Some(value))?;
        Ok(self.op(op)?.output())
    }

    /// Attaches a new, empty nested block to `op`.
    pub fn add_nested_block(
        &mut self,
        op: OpId,
        name: &str,
        inputs: &[(&str, VarType)],
    ) -> Result<BlockId> {
        self.op(op)?;
        let block = self.new_block(name, Some(op), inputs);
        self.op_mut(op)?.blocks.push(block);
        Ok(block)
    }

    /// Replaces the outputs of `block`. Every output must be visible at the
    /// end of the block.
    pub fn set_outputs(&mut self, block: BlockId, outputs: &[VarId]) -> Result<()> {
        let end = self.blocks[block.0].operations.len();
        let visible = self.visible_vars(block, end)?;
        for output in outputs {
            if !visible.contains(output) {
                return Err(invariant_violation!(
                    "var '%{}' is not visible in block '{}' and cannot be a block output",
                    self.vars[output.0].name,
                    self.blocks[block.0].name
                ));
            }
        }

        let previous = std::mem::take(&mut self.blocks[block.0].outputs);
        for output in previous {
            remove_one(&mut self.vars[output.0].consuming_blocks, &block);
        }
        for output in outputs {
            self.vars[output.0].consuming_blocks.push(block);
        }
        self.blocks[block.0].outputs = outputs.to_vec();
        Ok(())
    }

    /// `base` if no op or var in scope of `block` is named that yet,
    /// otherwise the first free `base_<n>`. Block inputs and enclosing
    /// scopes count, so a printed name always denotes one var.
    pub fn fresh_op_name(&self, block: BlockId, base: &str) -> String {
        if !self.name_in_scope(block, base) {
            return base.to_string();
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.name_in_scope(block, &candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    pub fn position_in_block(&self, block: BlockId, op: OpId) -> Result<usize> {
        self.blocks[block.0]
            .operations
            .iter()
            .position(|id| *id == op)
            .ok_or_else(|| {
                invariant_violation!(
                    "op {:?} not found in block '{}'",
                    op,
                    self.blocks[block.0].name
                )
            })
    }

    /// Vars an op placed at index `end` of `block` may reference: everything
    /// visible before the outer op in enclosing scopes, the block inputs, and
    /// the outputs of the first `end` ops of the block.
    pub fn visible_vars(&self, block: BlockId, end: usize) -> Result<HashSet<VarId>> {
        let mut visible = match self.blocks[block.0].outer_op {
            Some(outer) => {
                let enclosing = self.op(outer)?.enclosing_block;
                let position = self.position_in_block(enclosing, outer)?;
                self.visible_vars(enclosing, position)?
            }
            None => HashSet::new(),
        };

        let current = &self.blocks[block.0];
        visible.extend(current.inputs.iter().copied());
        for op in current.operations.iter().take(end) {
            visible.extend(self.op(*op)?.outputs.iter().copied());
        }
        Ok(visible)
    }

    fn name_in_scope(&self, block: BlockId, name: &str) -> bool {
        let current = &self.blocks[block.0];
        let input_named = current.inputs.iter().any(|v| self.vars[v.0].name == name);
        let op_named = current
            .operations
            .iter()
            .filter_map(|id| self.ops[id.0].as_ref())
            .any(|op| op.name == name || op.outputs.iter().any(|v| self.vars[v.0].name == name));
        if input_named || op_named {
            return true;
        }
        match current.outer_op.and_then(|outer| self.ops[outer.0].as_ref()) {
            Some(outer) => self.name_in_scope(outer.enclosing_block, name),
            None => false,
        }
    }

    fn op_name_taken(&self, block: BlockId, name: &str) -> bool {
        self.blocks[block.0]
            .operations
            .iter()
            .filter_map(|id| self.ops[id.0].as_ref())
            .any(|op| op.name == name)
    }

    fn new_block(&mut self, name: &str, outer_op: Option<OpId>, inputs: &[(&str, VarType)]) -> BlockId {
        let inputs = inputs
            .iter()
            .map(|(input, ty)| self.new_var(input, ty.clone(), None, None))
            .collect();
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            name: name.to_string(),
            inputs,
            operations: vec![],
            outputs: vec![],
            outer_op,
        });
        id
    }

    fn new_var(&mut self, name: &str, ty: VarType, producer: Option<OpId>, value: Option<Value>) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(Var {
            name: name.to_string(),
            ty,
            value,
            producer,
            consumers: vec![],
            consuming_blocks: vec![],
        });
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn place_op(
        &mut self,
        block: BlockId,
        position: usize,
        name: &str,
        op_type: &str,
        inputs: &[(&str, VarId)],
        outputs: &[VarType],
        value: Option<Value>,
    ) -> Result<OpId> {
        if outputs.is_empty() {
            return Err(invariant_violation!("op '{}' must produce at least one output", name));
        }
        if self.op_name_taken(block, name) {
            return Err(invariant_violation!(
                "op name '{}' is already used in block '{}'",
                name,
                self.blocks[block.0].name
            ));
        }

        // Check everything before touching the arenas.
        let visible = self.visible_vars(block, position)?;
        let mut named_inputs = IndexMap::with_capacity(inputs.len());
        for (key, var) in inputs {
            if !visible.contains(var) {
                return Err(invariant_violation!(
                    "op '{}' input {}=%{} is not in scope of block '{}'",
                    name,
                    key,
                    self.vars[var.0].name,
                    self.blocks[block.0].name
                ));
            }
            if named_inputs.insert(key.to_string(), *var).is_some() {
                return Err(invariant_violation!("op '{}' has duplicate input '{}'", name, key));
            }
        }

        let id = OpId(self.ops.len());
        let mut output_ids = Vec::with_capacity(outputs.len());
        let mut value = value;
        for (i, ty) in outputs.iter().enumerate() {
            let var_name = if outputs.len() == 1 {
                name.to_string()
            } else {
                format!("{name}:{i}")
            };
            output_ids.push(self.new_var(&var_name, ty.clone(), Some(id), value.take()));
        }
        for var in named_inputs.values() {
            self.vars[var.0].consumers.push(id);
        }

        self.ops.push(Some(Operation {
            name: name.to_string(),
            op_type: op_type.to_string(),
            inputs: named_inputs,
            outputs: output_ids,
            blocks: vec![],
            enclosing_block: block,
        }));
        self.blocks[block.0].operations.insert(position, id);
        Ok(id)
    }
}

/// Removes the first occurrence of `item`, returning whether one was found.
pub(crate) fn remove_one<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    match items.iter().position(|candidate| candidate == item) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}

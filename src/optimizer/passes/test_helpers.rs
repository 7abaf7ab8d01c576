use std::io;
use std::sync::{Arc, Mutex};

use crate::ir::{BlockId, Program, Value, VarId, VarType};

pub fn fp32() -> VarType {
    VarType::fp32()
}

// Program with a single `main` function taking one fp32 input per name
pub fn create_test_program(inputs: &[&str]) -> (Program, BlockId, Vec<VarId>) {
    let mut program = Program::new();
    let typed: Vec<(&str, VarType)> = inputs.iter().map(|name| (*name, fp32())).collect();
    let body = program.add_function("main", &typed).unwrap();
    let vars = program.block(body).inputs().to_vec();
    (program, body, vars)
}

pub fn cnst(program: &mut Program, block: BlockId, name: &str, val: f64) -> VarId {
    program.append_const(block, name, Value::Float(val)).unwrap()
}

pub fn binop(
    program: &mut Program,
    block: BlockId,
    name: &str,
    op_type: &str,
    x: VarId,
    y: VarId,
) -> VarId {
    let op = program
        .append_op(block, name, op_type, &[("x", x), ("y", y)], &[fp32()])
        .unwrap();
    program.op(op).unwrap().output()
}

pub fn op_types(program: &Program, block: BlockId) -> Vec<String> {
    program
        .block(block)
        .operations()
        .iter()
        .map(|op| program.op(*op).unwrap().op_type().to_string())
        .collect()
}

pub fn op_names(program: &Program, block: BlockId) -> Vec<String> {
    program
        .block(block)
        .operations()
        .iter()
        .map(|op| program.op(*op).unwrap().name().to_string())
        .collect()
}

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// Runs `f` with a subscriber that records warnings into the returned text
pub fn capture_warnings<F: FnOnce()>(f: F) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    buffer.contents()
}

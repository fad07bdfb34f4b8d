mod disassembler;
mod instruction;
mod opcode;
pub(crate) mod parser;
mod pool;

use std::fmt;

pub use disassembler::disassemble;
pub use instruction::{DecodeError, Instruction, INSTRUCTION_WIDTH};
pub use opcode::{BinaryOp, CompareOp, OpCode};
pub use parser::{Parser, ParseError};
pub use pool::{ConstantPool, PoolKind, PoolOverflow, VariableTable, POOL_CAPACITY};

/// Represents a literal stored in the constant pool
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(i) => write!(f, "{}", i),
            Constant::Float(fl) => write_float(f, *fl),
            Constant::Boolean(b) => write_bool(f, *b),
            Constant::String(s) => write!(f, "{}", s),
        }
    }
}

/// Printable form of a double: shortest round-trip digits, no trailing `.0`
pub(crate) fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_infinite() {
        let sign = if value.is_sign_negative() { "-" } else { "" };
        write!(f, "{}Infinity", sign)
    } else {
        write!(f, "{}", value)
    }
}

pub(crate) fn write_bool(f: &mut fmt::Formatter<'_>, value: bool) -> fmt::Result {
    f.write_str(if value { "True" } else { "False" })
}

/// A compiled program: the instruction stream plus the pools it indexes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub code: Vec<u8>,
    pub constants: Vec<Constant>,
    pub variables: Vec<String>,
}

impl Program {
    pub fn new(code: Vec<u8>, constants: Vec<Constant>, variables: Vec<String>) -> Self {
        Self {
            code,
            constants,
            variables,
        }
    }

    pub fn constant(&self, idx: u8) -> Option<&Constant> {
        self.constants.get(idx as usize)
    }

    pub fn variable_name(&self, idx: u8) -> Option<&str> {
        self.variables.get(idx as usize).map(String::as_str)
    }

    pub fn instruction_count(&self) -> usize {
        self.code.len() / INSTRUCTION_WIDTH
    }

    pub fn instructions(&self) -> impl Iterator<Item = (usize, Result<Instruction, DecodeError>)> + '_ {
        Instruction::iter(&self.code)
    }
}

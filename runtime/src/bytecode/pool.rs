//! Interning tables for constants and variable names.
//!
//! Operands are a single byte wide, so each table holds at most
//! [`POOL_CAPACITY`] entries. Indices are handed out in first-occurrence
//! order and never change for the lifetime of the table.

use std::fmt;
use rustc_hash::FxHashMap;
use thiserror::Error;
use crate::bytecode::Constant;

/// Maximum number of entries addressable by a one-byte operand
pub const POOL_CAPACITY: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Constant,
    Variable,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Constant => write!(f, "constant"),
            PoolKind::Variable => write!(f, "variable"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} pool overflow: more than {} distinct entries", POOL_CAPACITY)]
pub struct PoolOverflow {
    pub kind: PoolKind,
}

/// Hashable identity of a constant. Floats are keyed by bit pattern and
/// never collide with integers, so `1` and `1.0` get separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Integer(i64),
    Float(u64),
    Boolean(bool),
    String(String),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Integer(i) => ConstantKey::Integer(*i),
            Constant::Float(f) => ConstantKey::Float(f.to_bits()),
            Constant::Boolean(b) => ConstantKey::Boolean(*b),
            Constant::String(s) => ConstantKey::String(s.clone()),
        }
    }
}

/// Deduplicated constant pool
#[derive(Debug, Default, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: FxHashMap<ConstantKey, u8>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `constant`, adding it on first occurrence
    pub fn intern(&mut self, constant: Constant) -> Result<u8, PoolOverflow> {
        let key = ConstantKey::from(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }
        let idx = u8::try_from(self.entries.len())
            .map_err(|_| PoolOverflow { kind: PoolKind::Constant })?;
        self.entries.push(constant);
        self.index.insert(key, idx);
        Ok(idx)
    }

    pub fn get(&self, idx: u8) -> Option<&Constant> {
        self.entries.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Constant> {
        self.entries
    }
}

/// Deduplicated variable-name table
#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    names: Vec<String>,
    index: FxHashMap<String, u8>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the slot of `name`, assigning the next slot on first use
    pub fn resolve(&mut self, name: &str) -> Result<u8, PoolOverflow> {
        if let Some(&idx) = self.index.get(name) {
            return Ok(idx);
        }
        let idx = u8::try_from(self.names.len())
            .map_err(|_| PoolOverflow { kind: PoolKind::Variable })?;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn name(&self, idx: u8) -> Option<&str> {
        self.names.get(idx as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.names
    }
}

use std::fmt;
use crate::bytecode::{write_bool, write_float, Constant};

/// Represents a value in the VM
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Value {
    /// Runtime type name used when reporting results and type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Int64",
            Value::Float(_) => "Double",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Promote a numeric value to double precision
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality as seen by `CompareOp`: numbers compare by promoted value,
    /// everything else by variant and payload.
    pub fn equals(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// `"<printable> (<type name>)"`
    pub fn report(&self) -> String {
        format!("{} ({})", self, self.type_name())
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Integer(i) => Value::Integer(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Boolean(b) => Value::Boolean(*b),
            Constant::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write_float(f, *fl),
            Value::Boolean(b) => write_bool(f, *b),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

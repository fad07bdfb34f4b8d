use thiserror::Error;
use crate::bytecode::DecodeError;

/// Error type for VM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VMError {
    #[error("Unknown bytecode: 0x{byte:02X} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("Truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    #[error("'{name}' is not defined")]
    UndefinedVariable { index: u8, name: String },

    #[error("Cant do binary operation on '{left}' and '{right}'")]
    TypeMismatch { left: &'static str, right: &'static str },

    #[error("Cannot negate a value of type '{type_name}'")]
    InvalidNegation { type_name: &'static str },

    #[error("Expected a Boolean condition, found '{type_name}'")]
    ExpectedBoolean { type_name: &'static str },

    #[error("Invalid constant index: {0}")]
    InvalidConstantIndex(u8),

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Jump target {target} is past the end of the code ({len} bytes)")]
    InvalidJump { target: usize, len: usize },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Program stored no variables, nothing to report")]
    NoResult,
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownOpcode { byte, offset } => VMError::UnknownOpcode { byte, offset },
            DecodeError::Truncated { offset } => VMError::TruncatedInstruction { offset },
        }
    }
}

/// Result type for VM operations
pub type VMResult<T> = Result<T, VMError>;

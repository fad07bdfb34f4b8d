/// Opcodes for the VM. Every instruction is one opcode byte plus one operand byte.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Pool access
    LoadConst = 0x01,             // Push constant (operand: constant index)
    LoadVar = 0x02,               // Push variable slot (operand: variable index)
    StoreVar = 0x03,              // Pop into variable slot (operand: variable index)

    // Operators
    CompareOp = 0x04,             // Equality test (operand: CompareOp code)
    BinaryOp = 0x05,              // Arithmetic or concatenation (operand: BinaryOp code)
    UnaryNegate = 0x06,           // Negate top value (operand unused)

    // Forward-only control flow (operand: byte offset after this instruction)
    JumpIfTrueOrPop = 0x07,
    JumpIfFalseOrPop = 0x08,
    PopJumpForwardIfFalse = 0x09,
    PopJumpForwardIfTrue = 0x10,
}

const LOAD_CONST: u8 = OpCode::LoadConst as u8;
const LOAD_VAR: u8 = OpCode::LoadVar as u8;
const STORE_VAR: u8 = OpCode::StoreVar as u8;

const COMPARE_OP: u8 = OpCode::CompareOp as u8;
const BINARY_OP: u8 = OpCode::BinaryOp as u8;
const UNARY_NEGATE: u8 = OpCode::UnaryNegate as u8;

const JUMP_IF_TRUE_OR_POP: u8 = OpCode::JumpIfTrueOrPop as u8;
const JUMP_IF_FALSE_OR_POP: u8 = OpCode::JumpIfFalseOrPop as u8;
const POP_JUMP_FORWARD_IF_FALSE: u8 = OpCode::PopJumpForwardIfFalse as u8;
const POP_JUMP_FORWARD_IF_TRUE: u8 = OpCode::PopJumpForwardIfTrue as u8;

impl OpCode {
    /// Convert a byte to an opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            LOAD_CONST => Some(OpCode::LoadConst),
            LOAD_VAR => Some(OpCode::LoadVar),
            STORE_VAR => Some(OpCode::StoreVar),

            COMPARE_OP => Some(OpCode::CompareOp),
            BINARY_OP => Some(OpCode::BinaryOp),
            UNARY_NEGATE => Some(OpCode::UnaryNegate),

            JUMP_IF_TRUE_OR_POP => Some(OpCode::JumpIfTrueOrPop),
            JUMP_IF_FALSE_OR_POP => Some(OpCode::JumpIfFalseOrPop),
            POP_JUMP_FORWARD_IF_FALSE => Some(OpCode::PopJumpForwardIfFalse),
            POP_JUMP_FORWARD_IF_TRUE => Some(OpCode::PopJumpForwardIfTrue),

            _ => None,
        }
    }

    /// Convert an opcode to a byte
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Listing name used by the disassembler
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::LoadConst => "LOAD_CONST",
            OpCode::LoadVar => "LOAD_VAR",
            OpCode::StoreVar => "STORE_VAR",
            OpCode::CompareOp => "COMPARE_OP",
            OpCode::BinaryOp => "BINARY_OP",
            OpCode::UnaryNegate => "UNARY_NEGATIVE",
            OpCode::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            OpCode::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            OpCode::PopJumpForwardIfFalse => "POP_JUMP_FORWARD_IF_FALSE",
            OpCode::PopJumpForwardIfTrue => "POP_JUMP_FORWARD_IF_TRUE",
        }
    }

    /// Whether the operand is a relative forward jump distance
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            OpCode::JumpIfTrueOrPop
                | OpCode::JumpIfFalseOrPop
                | OpCode::PopJumpForwardIfFalse
                | OpCode::PopJumpForwardIfTrue
        )
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::from_byte(byte).ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.to_byte()
    }
}

/// Operand of `CompareOp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal = 0x10,
    NotEqual = 0x11,
}

impl CompareOp {
    /// Decode a comparison operand. The VM treats every code other than
    /// `Equal` as an inequality test, so this never fails.
    pub fn from_code(code: u8) -> Self {
        if code == CompareOp::Equal as u8 {
            CompareOp::Equal
        } else {
            CompareOp::NotEqual
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
        }
    }
}

/// Operand of `BinaryOp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
}

impl BinaryOp {
    /// Decode an arithmetic operand; unrecognized codes divide.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x20 => BinaryOp::Add,
            0x21 => BinaryOp::Sub,
            0x22 => BinaryOp::Mul,
            _ => BinaryOp::Div,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

use thiserror::Error;
use crate::bytecode::OpCode;

/// Width of every encoded instruction: opcode byte + operand byte
pub const INSTRUCTION_WIDTH: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown opcode 0x{byte:02X} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("Truncated instruction at offset {offset}")]
    Truncated { offset: usize },
}

/// Represents a single decoded bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: u8,
}

impl Instruction {
    pub fn new(opcode: OpCode, operand: u8) -> Self {
        Self { opcode, operand }
    }

    /// Decode the instruction starting at `offset`
    pub fn decode(code: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let (byte, operand) = match code.get(offset..offset + INSTRUCTION_WIDTH) {
            Some(&[byte, operand]) => (byte, operand),
            _ => return Err(DecodeError::Truncated { offset }),
        };
        let opcode = OpCode::from_byte(byte)
            .ok_or(DecodeError::UnknownOpcode { byte, offset })?;
        Ok(Self { opcode, operand })
    }

    /// Append the two encoded bytes to `code`
    pub fn encode_into(&self, code: &mut Vec<u8>) {
        code.push(self.opcode.to_byte());
        code.push(self.operand);
    }

    /// Walk `code` instruction by instruction, yielding each offset with its decode result
    pub fn iter(code: &[u8]) -> impl Iterator<Item = (usize, Result<Instruction, DecodeError>)> + '_ {
        (0..code.len())
            .step_by(INSTRUCTION_WIDTH)
            .map(move |offset| (offset, Instruction::decode(code, offset)))
    }
}

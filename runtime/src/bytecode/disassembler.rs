//! Static listing of a compiled program.
//!
//! Decoding never executes anything: operands are resolved against the
//! program's pools only, so a program that would fail at runtime can still
//! be listed.

use crate::bytecode::{BinaryOp, CompareOp, DecodeError, Instruction, OpCode, Program};

/// Render one `<mnemonic>\t<operand> (<resolved>)` line per instruction
pub fn disassemble(program: &Program) -> Result<String, DecodeError> {
    let mut out = String::new();
    for (_, decoded) in program.instructions() {
        let instruction = decoded?;
        out.push_str(&format!(
            "{}\t{} ({})\n",
            instruction.opcode.mnemonic(),
            instruction.operand,
            resolve_operand(program, &instruction)
        ));
    }
    Ok(out)
}

fn resolve_operand(program: &Program, instruction: &Instruction) -> String {
    let operand = instruction.operand;
    match instruction.opcode {
        OpCode::LoadConst => program
            .constant(operand)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string()),
        OpCode::LoadVar | OpCode::StoreVar => program
            .variable_name(operand)
            .unwrap_or("?")
            .to_string(),
        OpCode::CompareOp => CompareOp::from_code(operand).symbol().to_string(),
        OpCode::BinaryOp => BinaryOp::from_code(operand).symbol().to_string(),
        OpCode::UnaryNegate => String::new(),
        OpCode::JumpIfTrueOrPop
        | OpCode::JumpIfFalseOrPop
        | OpCode::PopJumpForwardIfFalse
        | OpCode::PopJumpForwardIfTrue => operand.to_string(),
    }
}

//! Utility functions for the alla bytecode runtime

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write, Error as IoError};
use std::path::Path;
use byteorder::{BigEndian, WriteBytesExt};
use crate::bytecode::{Constant, Program, INSTRUCTION_WIDTH, POOL_CAPACITY};
use crate::bytecode::parser::{MAGIC, MAJOR_VERSION, TAG_BOOLEAN, TAG_FLOAT, TAG_INTEGER, TAG_STRING};

/// Writes a compiled program to a file
pub fn write_program<P: AsRef<Path>>(program: &Program, path: P) -> Result<(), IoError> {
    check_encodable(program)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_program(program, &mut writer)?;
    writer.flush()
}

/// Serializes a compiled program in the `.alb` layout
///
/// Programs the reader would reject are refused before any byte is written.
pub fn encode_program<W: Write>(program: &Program, writer: &mut W) -> Result<(), IoError> {
    check_encodable(program)?;

    writer.write_u32::<BigEndian>(MAGIC)?;

    writer.write_u8(MAJOR_VERSION)?;
    writer.write_u8(0)?; // Minor version
    writer.write_u16::<BigEndian>(0)?; // Patch version

    writer.write_u32::<BigEndian>(program.constants.len() as u32)?;
    for constant in &program.constants {
        match constant {
            Constant::Integer(i) => {
                writer.write_u8(TAG_INTEGER)?;
                writer.write_i64::<BigEndian>(*i)?;
            }
            Constant::Float(f) => {
                writer.write_u8(TAG_FLOAT)?;
                writer.write_f64::<BigEndian>(*f)?;
            }
            Constant::String(s) => {
                writer.write_u8(TAG_STRING)?;
                write_str(writer, s)?;
            }
            Constant::Boolean(b) => {
                writer.write_u8(TAG_BOOLEAN)?;
                writer.write_u8(*b as u8)?;
            }
        }
    }

    writer.write_u32::<BigEndian>(program.variables.len() as u32)?;
    for name in &program.variables {
        write_str(writer, name)?;
    }

    writer.write_u32::<BigEndian>(program.code.len() as u32)?;
    writer.write_all(&program.code)?;
    Ok(())
}

fn check_encodable(program: &Program) -> Result<(), IoError> {
    if program.code.len() % INSTRUCTION_WIDTH != 0 {
        return Err(IoError::new(ErrorKind::InvalidData, "Odd code length"));
    }
    for (pool, len) in [("constant", program.constants.len()), ("variable", program.variables.len())] {
        if len > POOL_CAPACITY {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!("Too many {} entries: {} (limit {})", pool, len, POOL_CAPACITY),
            ));
        }
    }
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, s: &str) -> Result<(), IoError> {
    writer.write_u32::<BigEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())
}

/// Generate a hand-assembled demonstration program
///
/// ```text
/// num1 = 10
/// num2 = 20
/// result = num1 * 4 + (num2 + 9 / num1 * 5)
/// ok = result == 64.5 and num1 != num2
/// greeting = "Hello, " + "alla" + "! " + result
/// ```
pub fn generate_demo_program() -> Program {
    use crate::bytecode::{BinaryOp, CompareOp, Instruction, OpCode};

    let constants = vec![
        Constant::Integer(10),                 // 0
        Constant::Integer(20),                 // 1
        Constant::Integer(4),                  // 2
        Constant::Integer(9),                  // 3
        Constant::Integer(5),                  // 4
        Constant::Float(64.5),                 // 5
        Constant::String("Hello, ".to_string()), // 6
        Constant::String("alla".to_string()),  // 7
        Constant::String("! ".to_string()),    // 8
    ];
    let variables = vec![
        "num1".to_string(),     // 0
        "num2".to_string(),     // 1
        "result".to_string(),   // 2
        "ok".to_string(),       // 3
        "greeting".to_string(), // 4
    ];

    let add = BinaryOp::Add.code();
    let mul = BinaryOp::Mul.code();
    let div = BinaryOp::Div.code();

    let instructions = [
        /* 00 */ Instruction::new(OpCode::LoadConst, 0),
        /* 02 */ Instruction::new(OpCode::StoreVar, 0),
        /* 04 */ Instruction::new(OpCode::LoadConst, 1),
        /* 06 */ Instruction::new(OpCode::StoreVar, 1),
        /* 08 */ Instruction::new(OpCode::LoadVar, 0),
        /* 0A */ Instruction::new(OpCode::LoadConst, 2),
        /* 0C */ Instruction::new(OpCode::BinaryOp, mul),
        /* 0E */ Instruction::new(OpCode::LoadVar, 1),
        /* 10 */ Instruction::new(OpCode::LoadConst, 3),
        /* 12 */ Instruction::new(OpCode::LoadVar, 0),
        /* 14 */ Instruction::new(OpCode::BinaryOp, div),
        /* 16 */ Instruction::new(OpCode::LoadConst, 4),
        /* 18 */ Instruction::new(OpCode::BinaryOp, mul),
        /* 1A */ Instruction::new(OpCode::BinaryOp, add),
        /* 1C */ Instruction::new(OpCode::BinaryOp, add),
        /* 1E */ Instruction::new(OpCode::StoreVar, 2),
        /* 20 */ Instruction::new(OpCode::LoadVar, 2),
        /* 22 */ Instruction::new(OpCode::LoadConst, 5),
        /* 24 */ Instruction::new(OpCode::CompareOp, CompareOp::Equal.code()),
        /* 26 */ Instruction::new(OpCode::JumpIfFalseOrPop, 6), // skip to 0x2E
        /* 28 */ Instruction::new(OpCode::LoadVar, 0),
        /* 2A */ Instruction::new(OpCode::LoadVar, 1),
        /* 2C */ Instruction::new(OpCode::CompareOp, CompareOp::NotEqual.code()),
        /* 2E */ Instruction::new(OpCode::StoreVar, 3),
        /* 30 */ Instruction::new(OpCode::LoadConst, 6),
        /* 32 */ Instruction::new(OpCode::LoadConst, 7),
        /* 34 */ Instruction::new(OpCode::BinaryOp, add),
        /* 36 */ Instruction::new(OpCode::LoadConst, 8),
        /* 38 */ Instruction::new(OpCode::BinaryOp, add),
        /* 3A */ Instruction::new(OpCode::LoadVar, 2),
        /* 3C */ Instruction::new(OpCode::BinaryOp, add),
        /* 3E */ Instruction::new(OpCode::StoreVar, 4),
    ];

    let mut code = Vec::with_capacity(instructions.len() * 2);
    for instruction in &instructions {
        instruction.encode_into(&mut code);
    }

    Program::new(code, constants, variables)
}

use std::io::{Error as IoError, Read};
use byteorder::{ReadBytesExt, BigEndian};
use thiserror::Error;
use crate::bytecode::{Constant, Program, INSTRUCTION_WIDTH, POOL_CAPACITY};

/// "ALLA" in ASCII
pub(crate) const MAGIC: u32 = 0x414C4C41;
pub(crate) const MAJOR_VERSION: u8 = 1;

pub(crate) const TAG_INTEGER: u8 = 1;
pub(crate) const TAG_FLOAT: u8 = 2;
pub(crate) const TAG_STRING: u8 = 3;
pub(crate) const TAG_BOOLEAN: u8 = 4;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),

    #[error("Invalid bytecode format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported bytecode version: {0}")]
    UnsupportedVersion(u8),
}

pub struct Parser;

impl Parser {
    /// Parse a compiled program from a reader (file, memory buffer, etc.)
    pub fn parse<R: Read>(reader: &mut R) -> Result<Program, ParseError> {
        let magic = reader.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(ParseError::InvalidFormat("Invalid magic number".to_string()));
        }

        let version = reader.read_u8()?;
        if version != MAJOR_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }
        let _minor_version = reader.read_u8()?;
        let _patch_version = reader.read_u16::<BigEndian>()?;

        let constants_len = Self::read_pool_len(reader, "constant")?;
        let mut constants = Vec::with_capacity(constants_len);
        for _ in 0..constants_len {
            let const_type = reader.read_u8()?;
            let constant = match const_type {
                TAG_INTEGER => Constant::Integer(reader.read_i64::<BigEndian>()?),
                TAG_FLOAT => Constant::Float(reader.read_f64::<BigEndian>()?),
                TAG_STRING => Constant::String(Self::read_string(reader)?),
                TAG_BOOLEAN => Constant::Boolean(reader.read_u8()? != 0),
                _ => return Err(ParseError::InvalidFormat(format!("Unknown constant type: {}", const_type))),
            };
            constants.push(constant);
        }

        let variables_len = Self::read_pool_len(reader, "variable")?;
        let mut variables = Vec::with_capacity(variables_len);
        for _ in 0..variables_len {
            variables.push(Self::read_string(reader)?);
        }

        let code_len = reader.read_u32::<BigEndian>()? as usize;
        if code_len % INSTRUCTION_WIDTH != 0 {
            return Err(ParseError::InvalidFormat(format!("Odd code length: {}", code_len)));
        }
        let mut code = vec![0u8; code_len];
        reader.read_exact(&mut code)?;

        Ok(Program::new(code, constants, variables))
    }

    fn read_pool_len<R: Read>(reader: &mut R, pool: &str) -> Result<usize, ParseError> {
        let len = reader.read_u32::<BigEndian>()? as usize;
        if len > POOL_CAPACITY {
            return Err(ParseError::InvalidFormat(format!(
                "Too many {} entries: {} (limit {})",
                pool, len, POOL_CAPACITY
            )));
        }
        Ok(len)
    }

    fn read_string<R: Read>(reader: &mut R) -> Result<String, ParseError> {
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|e| ParseError::InvalidFormat(format!("Invalid UTF-8 string: {}", e)))
    }
}

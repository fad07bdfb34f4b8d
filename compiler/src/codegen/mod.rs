//! Single-pass bytecode generation.
//!
//! The compiler is a recursive-descent parser that emits instructions as
//! soon as each grammar rule is recognized; no syntax tree is built.
//! Precedence, lowest first: `or`, `and`, `== !=`, `+ -`, `* /`, unary `-`.

use alla::bytecode::{
    BinaryOp, CompareOp, Constant, ConstantPool, Instruction, OpCode, PoolOverflow, Program,
    VariableTable,
};
use tracing::debug;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::parser::{Mismatch, TokenCursor};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Lex(#[from] LexerError),

    #[error("Unexpected token '{found}' at line {line}, column {column}")]
    UnexpectedToken { found: String, line: usize, column: usize },

    #[error("Expected {expected}, got '{found}' at line {line}, column {column}")]
    ExpectedToken {
        expected: TokenKind,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("Unknown operator {0}")]
    UnknownOperator(TokenKind),

    #[error("Invalid number literal '{literal}' at line {line}")]
    InvalidNumber { literal: String, line: usize },

    #[error(transparent)]
    PoolOverflow(#[from] PoolOverflow),

    #[error("Jump distance of {distance} bytes does not fit in one operand byte")]
    JumpTooFar { distance: usize },
}

pub struct Compiler {
    cursor: TokenCursor,
    code: Vec<u8>,
    constants: ConstantPool,
    variables: VariableTable,
}

impl Compiler {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            code: Vec::new(),
            constants: ConstantPool::new(),
            variables: VariableTable::new(),
        }
    }

    /// Compile every statement in the token stream
    pub fn compile(mut self) -> Result<Program, CompileError> {
        while !self.cursor.is_at_end() {
            self.statement()?;
        }

        debug!(
            tokens = self.cursor.len(),
            bytes = self.code.len(),
            constants = self.constants.len(),
            variables = self.variables.len(),
            "compiled program"
        );

        Ok(Program::new(
            self.code,
            self.constants.into_vec(),
            self.variables.into_vec(),
        ))
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        let is_assignment = self.cursor.check(TokenKind::Identifier)
            && self
                .cursor
                .peek_next()
                .map_or(false, |token| token.kind == TokenKind::Assign);

        if is_assignment {
            self.assignment()
        } else {
            self.expression()
        }
    }

    fn assignment(&mut self) -> Result<(), CompileError> {
        let name = self.expect(TokenKind::Identifier)?.value;
        self.expect(TokenKind::Assign)?;

        // The slot exists before the right-hand side is compiled, so a
        // self-reference like `x = x` resolves to it.
        let slot = self.variables.resolve(&name)?;
        self.expression()?;
        self.emit(OpCode::StoreVar, slot);
        Ok(())
    }

    fn expression(&mut self) -> Result<(), CompileError> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> Result<(), CompileError> {
        self.and_expression()?;

        while self.cursor.match_any(&[TokenKind::Or]) {
            let jump = self.emit_jump(OpCode::JumpIfTrueOrPop);
            self.and_expression()?;
            self.patch_jump(jump)?;
        }
        Ok(())
    }

    fn and_expression(&mut self) -> Result<(), CompileError> {
        self.equality()?;

        while self.cursor.match_any(&[TokenKind::And]) {
            let jump = self.emit_jump(OpCode::JumpIfFalseOrPop);
            self.equality()?;
            self.patch_jump(jump)?;
        }
        Ok(())
    }

    fn equality(&mut self) -> Result<(), CompileError> {
        self.additive()?;

        while self.cursor.match_any(&[TokenKind::Equal, TokenKind::Unequal]) {
            let operator = self.previous_kind();
            self.additive()?;
            let code = match operator {
                TokenKind::Equal => CompareOp::Equal.code(),
                TokenKind::Unequal => CompareOp::NotEqual.code(),
                other => return Err(CompileError::UnknownOperator(other)),
            };
            self.emit(OpCode::CompareOp, code);
        }
        Ok(())
    }

    fn additive(&mut self) -> Result<(), CompileError> {
        self.multiplicative()?;

        while self.cursor.match_any(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = self.previous_kind();
            self.multiplicative()?;
            self.emit(OpCode::BinaryOp, binary_code(operator)?);
        }
        Ok(())
    }

    fn multiplicative(&mut self) -> Result<(), CompileError> {
        self.unary()?;

        while self.cursor.match_any(&[TokenKind::Multiply, TokenKind::Divide]) {
            let operator = self.previous_kind();
            self.unary()?;
            self.emit(OpCode::BinaryOp, binary_code(operator)?);
        }
        Ok(())
    }

    /// Negation binds to exactly one primary, so `10 -- 20` is `10 - (-20)`
    fn unary(&mut self) -> Result<(), CompileError> {
        if self.cursor.match_any(&[TokenKind::Minus]) {
            self.primary()?;
            self.emit(OpCode::UnaryNegate, 0);
            return Ok(());
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<(), CompileError> {
        let token = match self.cursor.advance() {
            Some(token) => token.clone(),
            None => {
                return Err(CompileError::UnexpectedEnd {
                    expected: "expression".to_string(),
                })
            }
        };

        match token.kind {
            TokenKind::Number => {
                let constant = number_literal(&token)?;
                self.load_constant(constant)
            }
            TokenKind::String => self.load_constant(Constant::String(token.value)),
            TokenKind::Bool => {
                let value = token.value.eq_ignore_ascii_case("true");
                self.load_constant(Constant::Boolean(value))
            }
            TokenKind::Identifier => {
                let slot = self.variables.resolve(&token.value)?;
                self.emit(OpCode::LoadVar, slot);
                Ok(())
            }
            TokenKind::LeftParen => {
                self.expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(())
            }
            _ => Err(CompileError::UnexpectedToken {
                found: token.value,
                line: token.line,
                column: token.column,
            }),
        }
    }

    fn load_constant(&mut self, constant: Constant) -> Result<(), CompileError> {
        let idx = self.constants.intern(constant)?;
        self.emit(OpCode::LoadConst, idx);
        Ok(())
    }

    fn emit(&mut self, opcode: OpCode, operand: u8) {
        Instruction::new(opcode, operand).encode_into(&mut self.code);
    }

    /// Emit a jump with a placeholder operand; returns the operand's position
    fn emit_jump(&mut self, opcode: OpCode) -> usize {
        self.emit(opcode, 0);
        self.code.len() - 1
    }

    /// Point the jump whose operand sits at `operand_pos` at the end of the
    /// code emitted so far
    fn patch_jump(&mut self, operand_pos: usize) -> Result<(), CompileError> {
        let distance = self.code.len() - operand_pos - 1;
        let offset = u8::try_from(distance).map_err(|_| CompileError::JumpTooFar { distance })?;
        self.code[operand_pos] = offset;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        match self.cursor.consume(kind) {
            Ok(token) => Ok(token.clone()),
            Err(Mismatch::Found(found)) => Err(CompileError::ExpectedToken {
                expected: kind,
                found: found.value,
                line: found.line,
                column: found.column,
            }),
            Err(Mismatch::End) => Err(CompileError::UnexpectedEnd {
                expected: kind.to_string(),
            }),
        }
    }

    /// Kind of the operator `match_any` just consumed
    fn previous_kind(&self) -> TokenKind {
        self.cursor
            .previous()
            .map(|token| token.kind)
            .unwrap_or(TokenKind::Identifier)
    }
}

fn binary_code(kind: TokenKind) -> Result<u8, CompileError> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Multiply => BinaryOp::Mul,
        TokenKind::Divide => BinaryOp::Div,
        other => return Err(CompileError::UnknownOperator(other)),
    };
    Ok(op.code())
}

/// A literal with a decimal point is a float, anything else an integer
fn number_literal(token: &Token) -> Result<Constant, CompileError> {
    let invalid = || CompileError::InvalidNumber {
        literal: token.value.clone(),
        line: token.line,
    };

    if token.value.contains('.') {
        token.value.parse::<f64>().map(Constant::Float).map_err(|_| invalid())
    } else {
        token.value.parse::<i64>().map(Constant::Integer).map_err(|_| invalid())
    }
}

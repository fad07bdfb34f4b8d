pub mod lexer;
pub mod parser;
pub mod codegen;
pub mod cli;

pub use lexer::{tokenize, Lexer, LexerError, Token, TokenKind};
pub use parser::TokenCursor;
pub use codegen::{CompileError, Compiler};

use alla::bytecode::Program;

/// Tokenize and compile a complete source text
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    Compiler::new(tokens).compile()
}

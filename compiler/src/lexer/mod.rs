use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    Bool,

    Identifier,

    // Operators
    Assign,     // =
    Plus,       // +
    Minus,      // -
    Multiply,   // *
    Divide,     // /
    Equal,      // ==
    Unequal,    // !=
    And,        // and, &&, &
    Or,         // or, ||, |

    LeftParen,  // (
    RightParen, // )
}

/// A lexical token. `value` holds the literal text: digits of a number,
/// the unescaped contents of a string, an identifier's name, or the
/// operator as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number => write!(f, "number"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Bool => write!(f, "boolean"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Multiply => write!(f, "'*'"),
            TokenKind::Divide => write!(f, "'/'"),
            TokenKind::Equal => write!(f, "'=='"),
            TokenKind::Unequal => write!(f, "'!='"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input. The stream has no end marker; consumers
    /// detect the end by running out of tokens.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace()?;

            if self.is_at_end() {
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexerError> {
        let start_line = self.line;
        let start_column = self.column;

        let ch = self.advance();

        let (kind, value) = match ch {
            '(' => (TokenKind::LeftParen, ch.to_string()),
            ')' => (TokenKind::RightParen, ch.to_string()),
            '+' => (TokenKind::Plus, ch.to_string()),
            '-' => (TokenKind::Minus, ch.to_string()),
            '*' => (TokenKind::Multiply, ch.to_string()),
            '/' => (TokenKind::Divide, ch.to_string()),
            '=' => {
                if self.match_char('=') {
                    (TokenKind::Equal, "==".to_string())
                } else {
                    (TokenKind::Assign, "=".to_string())
                }
            }
            '!' => {
                if self.match_char('=') {
                    (TokenKind::Unequal, "!=".to_string())
                } else {
                    return Err(LexerError::UnexpectedCharacter(ch, start_line, start_column));
                }
            }
            '&' => {
                let text = if self.match_char('&') { "&&" } else { "&" };
                (TokenKind::And, text.to_string())
            }
            '|' => {
                let text = if self.match_char('|') { "||" } else { "|" };
                (TokenKind::Or, text.to_string())
            }
            '"' => (TokenKind::String, self.string(start_line, start_column)?),
            _ if ch.is_ascii_digit() || (ch == '.' && self.peek().is_ascii_digit()) => {
                self.position -= 1;
                self.column -= 1;
                (TokenKind::Number, self.number())
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                self.position -= 1;
                self.column -= 1;
                self.identifier_or_keyword()
            }
            _ => return Err(LexerError::UnexpectedCharacter(ch, start_line, start_column)),
        };

        Ok(Token::new(kind, value, start_line, start_column))
    }

    fn string(&mut self, start_line: usize, start_column: usize) -> Result<String, LexerError> {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' {
            let ch = self.advance();
            match ch {
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                    value.push(ch);
                }
                '\\' => {
                    if self.is_at_end() {
                        return Err(LexerError::UnterminatedString(start_line, start_column));
                    }
                    let escaped = self.advance();
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '0' => value.push('\0'),
                        'u' => value.push(self.unicode_escape()?),
                        _ => {
                            return Err(LexerError::InvalidEscapeSequence(
                                escaped,
                                self.line,
                                self.column - 1,
                            ))
                        }
                    }
                }
                _ => value.push(ch),
            }
        }

        if self.is_at_end() {
            return Err(LexerError::UnterminatedString(start_line, start_column));
        }

        self.advance(); // Consume closing quote
        Ok(value)
    }

    /// Four hex digits following `\u`
    fn unicode_escape(&mut self) -> Result<char, LexerError> {
        let (line, column) = (self.line, self.column);
        let mut digits = String::new();
        for _ in 0..4 {
            if self.is_at_end() {
                return Err(LexerError::InvalidUnicodeEscape(line, column));
            }
            digits.push(self.advance());
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LexerError::InvalidUnicodeEscape(line, column))
    }

    /// Digits with at most one decimal point. A leading point is allowed
    /// (`.5`); the text is kept verbatim so the compiler can pick the
    /// literal's type.
    fn number(&mut self) -> String {
        let mut number = String::new();

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            number.push(self.advance());
        }

        if !self.is_at_end() && self.peek() == '.' {
            number.push(self.advance());
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                number.push(self.advance());
            }
        }

        number
    }

    fn identifier_or_keyword(&mut self) -> (TokenKind, String) {
        let mut identifier = String::new();

        while !self.is_at_end() && (self.peek().is_alphanumeric() || self.peek() == '_') {
            identifier.push(self.advance());
        }

        let kind = match identifier.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            s if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") => TokenKind::Bool,
            _ => TokenKind::Identifier,
        };
        (kind, identifier)
    }

    fn skip_whitespace(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                '/' if self.peek_next() == Some('/') => {
                    // Line comment
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance(); // consume '/'
                    self.advance(); // consume '*'
                    loop {
                        if self.is_at_end() {
                            return Err(LexerError::UnterminatedComment(line, column));
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance() == '\n' {
                            self.line += 1;
                            self.column = 1;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> char {
        let ch = self.input[self.position];
        self.position += 1;
        self.column += 1;
        ch
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at line {1}, column {2}")]
    UnexpectedCharacter(char, usize, usize),

    #[error("Unterminated string starting at line {0}, column {1}")]
    UnterminatedString(usize, usize),

    #[error("Unterminated comment starting at line {0}, column {1}")]
    UnterminatedComment(usize, usize),

    #[error("Invalid escape sequence '\\{0}' at line {1}, column {2}")]
    InvalidEscapeSequence(char, usize, usize),

    #[error("Invalid unicode escape at line {0}, column {1}")]
    InvalidUnicodeEscape(usize, usize),
}

impl LexerError {
    /// Line and column where the error was detected
    pub fn position(&self) -> (usize, usize) {
        match *self {
            LexerError::UnexpectedCharacter(_, line, column)
            | LexerError::InvalidEscapeSequence(_, line, column) => (line, column),
            LexerError::UnterminatedString(line, column)
            | LexerError::UnterminatedComment(line, column)
            | LexerError::InvalidUnicodeEscape(line, column) => (line, column),
        }
    }
}

/// Tokenize a source string
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(source).tokenize()
}

use crate::lexer::{Token, TokenKind};

/// Forward-only cursor over a token stream.
///
/// There is no end-of-file token: the stream ends when the index runs past
/// the last token, and every lookahead returns `None` from then on.
#[derive(Debug, Clone)]
pub struct TokenCursor {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenCursor {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    /// The token under the cursor
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    /// The token after the one under the cursor
    pub fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    /// The most recently consumed token
    pub fn previous(&self) -> Option<&Token> {
        self.current.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Consume the current token and return it
    pub fn advance(&mut self) -> Option<&Token> {
        if self.is_at_end() {
            return None;
        }
        self.current += 1;
        self.previous()
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().map_or(false, |token| token.kind == kind)
    }

    /// Consume the current token if it is one of `kinds`
    pub fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|kind| self.check(*kind)) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Consume a token of `kind` or report what was found instead
    pub fn consume(&mut self, kind: TokenKind) -> Result<&Token, Mismatch> {
        match self.peek() {
            Some(token) if token.kind == kind => {}
            Some(token) => return Err(Mismatch::Found(token.clone())),
            None => return Err(Mismatch::End),
        }
        self.current += 1;
        Ok(&self.tokens[self.current - 1])
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Why `consume` failed
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Found(Token),
    End,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn cursor(source: &str) -> TokenCursor {
        TokenCursor::new(tokenize(source).unwrap())
    }

    #[test]
    fn test_peek_and_peek_next() {
        let c = cursor("x = 1");
        assert_eq!(c.peek().unwrap().kind, TokenKind::Identifier);
        assert_eq!(c.peek_next().unwrap().kind, TokenKind::Assign);
        assert!(c.previous().is_none());
    }

    #[test]
    fn test_advance_to_end() {
        let mut c = cursor("a + b");
        assert_eq!(c.advance().unwrap().value, "a");
        assert_eq!(c.advance().unwrap().value, "+");
        assert_eq!(c.advance().unwrap().value, "b");
        assert!(c.is_at_end());
        assert!(c.advance().is_none());
        assert!(c.peek().is_none());
        assert_eq!(c.previous().unwrap().value, "b");
        assert_eq!(c.position(), 3);
    }

    #[test]
    fn test_match_any() {
        let mut c = cursor("* 2");
        assert!(!c.match_any(&[TokenKind::Plus, TokenKind::Minus]));
        assert!(c.match_any(&[TokenKind::Multiply, TokenKind::Divide]));
        assert_eq!(c.previous().unwrap().kind, TokenKind::Multiply);
        assert!(c.check(TokenKind::Number));
    }

    #[test]
    fn test_consume() {
        let mut c = cursor("( 1");
        assert_eq!(c.consume(TokenKind::LeftParen).unwrap().value, "(");
        match c.consume(TokenKind::RightParen) {
            Err(Mismatch::Found(token)) => assert_eq!(token.value, "1"),
            other => panic!("expected mismatch, got {:?}", other),
        }
        c.advance();
        assert_eq!(c.consume(TokenKind::RightParen), Err(Mismatch::End));
    }

    #[test]
    fn test_empty_stream() {
        let mut c = TokenCursor::new(Vec::new());
        assert!(c.is_empty());
        assert!(c.is_at_end());
        assert!(!c.check(TokenKind::Identifier));
        assert!(!c.match_any(&[TokenKind::Identifier]));
        assert!(c.peek_next().is_none());
    }
}

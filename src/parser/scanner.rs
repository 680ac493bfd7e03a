//! Token cursor shared by the parser, the fragment wrappers and the guesser

use super::error::ParseResult;
use super::lexer::{Lexer, LexicalToken, Token};
use super::span::Location;

/// Buffered token stream with arbitrary lookahead
#[derive(Debug, Clone)]
pub struct Scanner {
    tokens: Vec<LexicalToken>,
    position: usize,
    eof: LexicalToken,
}

impl Scanner {
    /// Tokenize the whole fragment up front; lexical errors surface here
    pub fn new(source: &str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token() {
            let token = token?;
            if !matches!(
                token.token,
                Token::Whitespace | Token::Bom | Token::LineComment | Token::BlockComment
            ) {
                tokens.push(token);
            }
        }
        let eof = LexicalToken::new(Token::Eof, String::new(), lexer.end_location());
        Ok(Self { tokens, position: 0, eof })
    }

    /// The next token, not consumed
    pub fn peek(&self) -> &LexicalToken {
        self.peek_nth(0)
    }

    /// The token `n` positions ahead of the next one
    pub fn peek_nth(&self, n: usize) -> &LexicalToken {
        self.tokens.get(self.position + n).unwrap_or(&self.eof)
    }

    /// Consume and return the next token; at the end keeps returning EOF
    pub fn read(&mut self) -> LexicalToken {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    pub fn is_keyword(&self, name: &str) -> bool {
        let token = self.peek();
        token.token.is_keyword() && token.lexeme == name
    }

    /// Next token is the operator or separator spelled `op`
    pub fn is_operator(&self, op: &str) -> bool {
        let token = self.peek();
        !token.token.is_keyword()
            && !token.token.is_literal()
            && !matches!(token.token, Token::Identifier | Token::Eof)
            && token.lexeme == op
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.peek().token, Token::Identifier)
    }

    /// Location of the next token
    pub fn location(&self) -> Location {
        self.peek().location
    }

    /// Remember the current position for backtracking
    pub fn mark(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self, mark: usize) {
        self.position = mark.min(self.tokens.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_read_and_eof() {
        let mut scanner = Scanner::new("import a.b;").unwrap();
        assert!(scanner.is_keyword("import"));
        assert_eq!(scanner.peek_nth(2).lexeme, ".");
        assert_eq!(scanner.read().lexeme, "import");
        assert!(scanner.is_identifier());
        for _ in 0..4 {
            scanner.read();
        }
        assert!(scanner.is_eof());
        assert!(scanner.read().is(&Token::Eof));
        assert_eq!(scanner.location(), Location::new(1, 12, 11));
    }

    #[test]
    fn test_operator_check_ignores_literals() {
        let scanner = Scanner::new("\"+\"").unwrap();
        assert!(!scanner.is_operator("+"));
        let scanner = Scanner::new("+").unwrap();
        assert!(scanner.is_operator("+"));
    }

    #[test]
    fn test_mark_and_reset() {
        let mut scanner = Scanner::new("a b c").unwrap();
        let mark = scanner.mark();
        scanner.read();
        scanner.read();
        scanner.reset(mark);
        assert_eq!(scanner.peek().lexeme, "a");
    }
}

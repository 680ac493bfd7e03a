use logos::Logos;

use super::error::ParseError;
use super::span::Location;

/// Token types of the fragment language
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    // Keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("static")]
    Static,
    #[token("public")]
    Public,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("abstract")]
    Abstract,
    #[token("final")]
    Final,
    #[token("native")]
    Native,
    #[token("synchronized")]
    Synchronized,
    #[token("transient")]
    Transient,
    #[token("volatile")]
    Volatile,
    #[token("strictfp")]
    Strictfp,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("enum")]
    Enum,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("instanceof")]
    InstanceOf,
    #[token("void")]
    Void,
    #[token("boolean")]
    Boolean,
    #[token("byte")]
    Byte,
    #[token("short")]
    Short,
    #[token("int")]
    Int,
    #[token("long")]
    Long,
    #[token("char")]
    Char,
    #[token("float")]
    Float,
    #[token("double")]
    Double,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("assert")]
    Assert,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("throws")]
    Throws,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("goto")]
    Goto,
    #[token("const")]
    Const,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Operators
    #[token("=")]
    Assign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    ModAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    LShiftAssign,
    #[token(">>=")]
    RShiftAssign,
    #[token(">>>=")]
    URShiftAssign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token(">>>")]
    URShift,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    PipePipe,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // Separators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    // Literals
    #[regex(r#""([^"\\\n]|\\u[0-9a-fA-F]{4}|\\.)*""#)]
    StringLiteral,
    #[regex(r"'([^'\\\n]|\\u[0-9a-fA-F]{4}|\\.)'")]
    CharLiteral,
    /// Decimal, octal, hex or binary, with optional `L` suffix
    #[regex(r"(0[xX][0-9a-fA-F][0-9a-fA-F_]*|0[bB][01][01_]*|[0-9][0-9_]*)[lL]?")]
    IntegerLiteral,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[fFdD]")]
    FloatingLiteral,

    // Identifiers
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Identifier,

    // Comments and whitespace
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/", priority = 2)]
    BlockComment,
    #[regex(r"[ \t\n\r\f]+", priority = 2)]
    Whitespace,
    #[token("\u{FEFF}")]
    Bom,

    /// Synthetic end-of-input marker produced by the scanner, never by logos
    Eof,
}

impl Token {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(self,
            Token::Package | Token::Import | Token::Static |
            Token::Public | Token::Protected | Token::Private |
            Token::Abstract | Token::Final | Token::Native |
            Token::Synchronized | Token::Transient | Token::Volatile |
            Token::Strictfp | Token::Default | Token::Class | Token::Interface |
            Token::Enum | Token::Extends | Token::Implements |
            Token::New | Token::This | Token::Super |
            Token::InstanceOf | Token::Void | Token::Boolean |
            Token::Byte | Token::Short | Token::Int |
            Token::Long | Token::Char | Token::Float |
            Token::Double | Token::If | Token::Else |
            Token::For | Token::While | Token::Do |
            Token::Switch | Token::Case | Token::Assert |
            Token::Break | Token::Continue | Token::Return |
            Token::Throw | Token::Throws | Token::Try |
            Token::Catch | Token::Finally | Token::Goto | Token::Const |
            Token::True | Token::False | Token::Null
        )
    }

    /// Check if this token is a primitive type (`void` included)
    pub fn is_primitive_type(&self) -> bool {
        matches!(self,
            Token::Boolean | Token::Byte | Token::Short |
            Token::Int | Token::Long | Token::Char |
            Token::Float | Token::Double | Token::Void
        )
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self,
            Token::StringLiteral | Token::CharLiteral |
            Token::IntegerLiteral | Token::FloatingLiteral |
            Token::True | Token::False | Token::Null
        )
    }

    fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::Bom | Token::LineComment | Token::BlockComment)
    }
}

/// Lexical token with location information
#[derive(Debug, Clone)]
pub struct LexicalToken {
    pub token: Token,
    pub lexeme: String,
    pub location: Location,
}

impl LexicalToken {
    pub fn new(token: Token, lexeme: String, location: Location) -> Self {
        Self { token, lexeme, location }
    }

    /// Get the token type
    pub fn token_type(&self) -> &Token {
        &self.token
    }

    /// Get the lexeme (actual text)
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// Get the location
    pub fn location(&self) -> Location {
        self.location
    }

    /// Check if this token matches the given token type
    pub fn is(&self, token_type: &Token) -> bool {
        std::mem::discriminant(&self.token) == std::mem::discriminant(token_type)
    }

    /// Text used when the token shows up in an error message
    pub fn describe(&self) -> String {
        match self.token {
            Token::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

/// Lexer for fragments
pub struct Lexer<'a> {
    lexer: logos::Lexer<'a, Token>,
    location: Location,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Token::lexer(source),
            location: Location::start(),
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Result<LexicalToken, ParseError>> {
        let token = self.lexer.next()?;
        let location = self.location;
        let lexeme = self.lexer.slice();
        self.location.advance_str(lexeme);
        match token {
            Ok(token) => Some(Ok(LexicalToken::new(token, lexeme.to_string(), location))),
            Err(()) => Some(Err(ParseError::lexical_error(
                &format!("unexpected character sequence '{}'", lexeme),
                location,
            ))),
        }
    }

    /// All significant tokens of the source, comments and whitespace dropped
    pub fn tokenize(mut self) -> Result<Vec<LexicalToken>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(result) = self.next_token() {
            let token = result?;
            if !token.token.is_trivia() {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }

    /// Location just past the last consumed character
    pub fn end_location(&self) -> Location {
        self.location
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<LexicalToken, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Resolve the escape sequences of a string or character literal body
pub fn unescape(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(first @ '0'..='7') => {
                // octal escape: at most \377
                let max_digits = if first <= '3' { 3 } else { 2 };
                let mut value = first.to_digit(8).unwrap_or(0);
                for _ in 1..max_digits {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\0'));
            }
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid unicode escape '\\u{}'", hex))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("invalid unicode escape '\\u{}'", hex))?;
                out.push(ch);
            }
            Some(other @ ('\\' | '\'' | '"')) => out.push(other),
            Some(other) => return Err(format!("invalid escape sequence '\\{}'", other)),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("Failed to tokenize")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            kinds("public class Test extends Object implements Runnable"),
            vec![
                Token::Public,
                Token::Class,
                Token::Identifier,
                Token::Extends,
                Token::Identifier,
                Token::Implements,
                Token::Identifier,
            ]
        );
    }

    #[test]
    fn test_lexer_literals() {
        assert_eq!(
            kinds(r#"42 0x1F 0b101 017 10L "hello" 'a' '\n' true null"#),
            vec![
                Token::IntegerLiteral,
                Token::IntegerLiteral,
                Token::IntegerLiteral,
                Token::IntegerLiteral,
                Token::IntegerLiteral,
                Token::StringLiteral,
                Token::CharLiteral,
                Token::CharLiteral,
                Token::True,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_lexer_floating_literals() {
        assert_eq!(
            kinds("1.5 .5 7.95 1e10 2f 3.0d 100."),
            vec![Token::FloatingLiteral; 7]
        );
    }

    #[test]
    fn test_lexer_member_access_after_integer() {
        assert_eq!(
            kinds("a[1].length"),
            vec![
                Token::Identifier,
                Token::LBracket,
                Token::IntegerLiteral,
                Token::RBracket,
                Token::Dot,
                Token::Identifier,
            ]
        );
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            kinds("+ += ++ >> >>> >>>= && || ? :"),
            vec![
                Token::Plus,
                Token::AddAssign,
                Token::Inc,
                Token::RShift,
                Token::URShift,
                Token::URShiftAssign,
                Token::AndAnd,
                Token::PipePipe,
                Token::Question,
                Token::Colon,
            ]
        );
    }

    #[test]
    fn test_lexer_comments_and_locations() {
        let tokens = Lexer::new("// comment\n/* block\n */ x")
            .tokenize()
            .expect("Failed to tokenize");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].location, Location::new(3, 5, 24));
    }

    #[test]
    fn test_lexer_error_location() {
        let err = Lexer::new("a +\n  #").tokenize().unwrap_err();
        assert_eq!(err.location(), Some(&Location::new(2, 3, 6)));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\tb\n").unwrap(), "a\tb\n");
        assert_eq!(unescape(r"A\101\0").unwrap(), "AA\0");
        assert_eq!(unescape(r#"\"\\"#).unwrap(), "\"\\");
        assert!(unescape(r"\q").is_err());
    }
}

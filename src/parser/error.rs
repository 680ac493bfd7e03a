use std::fmt;

use super::span::Location;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected token encountered
    UnexpectedToken {
        expected: String,
        found: String,
        location: Location,
    },

    /// Unexpected end of input
    UnexpectedEndOfInput {
        expected: String,
        location: Location,
    },

    /// Invalid syntax
    InvalidSyntax {
        message: String,
        location: Location,
    },

    /// Lexical error
    LexicalError {
        message: String,
        location: Location,
    },
}

impl ParseError {
    /// Create a new unexpected token error
    pub fn unexpected_token(expected: &str, found: &str, location: Location) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            location,
        }
    }

    /// Create a new unexpected end of input error
    pub fn unexpected_end_of_input(expected: &str, location: Location) -> Self {
        ParseError::UnexpectedEndOfInput {
            expected: expected.to_string(),
            location,
        }
    }

    /// Create a new invalid syntax error
    pub fn invalid_syntax(message: &str, location: Location) -> Self {
        ParseError::InvalidSyntax {
            message: message.to_string(),
            location,
        }
    }

    /// Create a new lexical error
    pub fn lexical_error(message: &str, location: Location) -> Self {
        ParseError::LexicalError {
            message: message.to_string(),
            location,
        }
    }

    /// Get the location of the error
    pub fn location(&self) -> Option<&Location> {
        match self {
            ParseError::UnexpectedToken { location, .. } => Some(location),
            ParseError::UnexpectedEndOfInput { location, .. } => Some(location),
            ParseError::InvalidSyntax { location, .. } => Some(location),
            ParseError::LexicalError { location, .. } => Some(location),
        }
    }

    fn message(&self) -> String {
        match self {
            ParseError::UnexpectedToken { expected, found, .. } => {
                format!("expected {}, found {}", expected, found)
            }
            ParseError::UnexpectedEndOfInput { expected, .. } => {
                format!("unexpected end of input, expected {}", expected)
            }
            ParseError::InvalidSyntax { message, .. } | ParseError::LexicalError { message, .. } => {
                message.clone()
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self.location().copied().unwrap_or_default();
        match self {
            ParseError::LexicalError { .. } => {
                write!(f, "Lexical error at {}: {}", location, self.message())
            }
            _ => write!(f, "Parse error at {}: {}", location, self.message()),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Error {
    fn from(parse_error: ParseError) -> Self {
        let message = parse_error.message();
        match parse_error {
            ParseError::LexicalError { location, .. } => Error::Lexical { location, message },
            ParseError::UnexpectedToken { location, .. }
            | ParseError::UnexpectedEndOfInput { location, .. }
            | ParseError::InvalidSyntax { location, .. } => Error::Parse { location, message },
        }
    }
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_location() {
        let err: Error = ParseError::unexpected_token("';'", "'}'", Location::new(3, 7, 40)).into();
        match err {
            Error::Parse { location, message } => {
                assert_eq!(location, Location::new(3, 7, 40));
                assert_eq!(message, "expected ';', found '}'");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_lexical_conversion() {
        let err: Error = ParseError::lexical_error("bad", Location::start()).into();
        assert!(matches!(err, Error::Lexical { .. }));
    }
}

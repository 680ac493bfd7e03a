use std::fmt;
use thiserror::Error;

use crate::parser::Location;
use crate::rt::RuntimeError;

/// Result type for tolc-eval operations
pub type Result<T> = std::result::Result<T, Error>;

/// One compile-time complaint about the fragment, with the place it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self { location, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for the embedded compiler
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid descriptor \"{descriptor}\": {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    #[error("Type \"{descriptor}\" not found")]
    TypeNotFound { descriptor: String },

    #[error("Parse error at {location}: {message}")]
    Parse { location: Location, message: String },

    #[error("Lexical error at {location}: {message}")]
    Lexical { location: Location, message: String },

    #[error("Compilation failed with {} error(s): {}", .diagnostics.len(), join_diagnostics(.diagnostics))]
    Compile { diagnostics: Vec<Diagnostic> },

    #[error("Class \"{requested}\" not declared; declared classes are [{}]", .declared.join(", "))]
    ClassNotDeclared { requested: String, declared: Vec<String> },

    #[error("Cannot instantiate abstract class {class_name} -- one or more method implementations are missing: [{}]", .missing.join(", "))]
    Instantiation { class_name: String, missing: Vec<String> },

    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    /// Create an invalid descriptor error
    pub fn invalid_descriptor(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    /// Create a type-not-found error
    pub fn type_not_found(descriptor: impl Into<String>) -> Self {
        Self::TypeNotFound { descriptor: descriptor.into() }
    }

    /// Create a parse error with location information
    pub fn parse_error(location: Location, message: impl Into<String>) -> Self {
        Self::Parse { location, message: message.into() }
    }

    /// Create a lexical error
    pub fn lexical_error(location: Location, message: impl Into<String>) -> Self {
        Self::Lexical { location, message: message.into() }
    }

    /// Create an invalid signature error
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature { message: message.into() }
    }

    /// Source location of a parse or lexical error
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Parse { location, .. } | Error::Lexical { location, .. } => Some(*location),
            Error::Compile { diagnostics } => diagnostics.first().map(|d| d.location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_lists_diagnostics() {
        let err = Error::Compile {
            diagnostics: vec![
                Diagnostic::new(Location::new(1, 5, 4), "cannot resolve symbol 'x'"),
                Diagnostic::new(Location::new(2, 1, 10), "missing return statement"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("1:5: cannot resolve symbol 'x'"));
        assert_eq!(err.location(), Some(Location::new(1, 5, 4)));
    }

    #[test]
    fn test_class_not_declared_names_both_sides() {
        let err = Error::ClassNotDeclared {
            requested: "Bar".to_string(),
            declared: vec!["Foo".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Class \"Bar\" not declared; declared classes are [Foo]"
        );
    }
}

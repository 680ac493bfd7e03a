//! Faults raised while loading or running compiled fragments

use thiserror::Error;

fn exception_text(class_name: &str, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("{}: {}", class_name, message),
        None => class_name.to_string(),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A Java exception escaped the invoked method
    #[error("{}", exception_text(.class_name, .message))]
    Exception { class_name: String, message: Option<String> },

    #[error("No such method: {class_name}.{name}{descriptor}")]
    NoSuchMethod { class_name: String, name: String, descriptor: String },

    #[error("No such field: {class_name}.{name}")]
    NoSuchField { class_name: String, name: String },

    #[error("Class not found: {name}")]
    ClassNotFound { name: String },

    #[error("Argument mismatch: {message}")]
    ArgumentMismatch { message: String },

    #[error("Call depth exceeded {depth}")]
    StackOverflow { depth: usize },

    #[error("Invalid bytecode in {class_name}: {message}")]
    InvalidBytecode { class_name: String, message: String },

    #[error("Class loader of {class_name} is no longer alive")]
    LoaderDropped { class_name: String },
}

impl RuntimeError {
    pub fn exception(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception { class_name: class_name.into(), message: Some(message.into()) }
    }

    pub fn null_pointer() -> Self {
        Self::Exception { class_name: "java.lang.NullPointerException".to_string(), message: None }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::exception("java.lang.ArithmeticException", message)
    }

    pub fn index_out_of_bounds(index: i32, length: usize) -> Self {
        Self::exception(
            "java.lang.ArrayIndexOutOfBoundsException",
            format!("Index {} out of bounds for length {}", index, length),
        )
    }

    pub fn class_cast(from: &str, to: &str) -> Self {
        Self::exception(
            "java.lang.ClassCastException",
            format!("class {} cannot be cast to class {}", from, to),
        )
    }

    pub fn no_such_method(class_name: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self::NoSuchMethod { class_name: class_name.into(), name: name.into(), descriptor: descriptor.into() }
    }

    pub fn no_such_field(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NoSuchField { class_name: class_name.into(), name: name.into() }
    }

    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::ClassNotFound { name: name.into() }
    }

    pub fn argument_mismatch(message: impl Into<String>) -> Self {
        Self::ArgumentMismatch { message: message.into() }
    }

    pub fn invalid_bytecode(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBytecode { class_name: class_name.into(), message: message.into() }
    }

    /// Class name of an escaped Java exception
    pub fn exception_class(&self) -> Option<&str> {
        match self {
            RuntimeError::Exception { class_name, .. } => Some(class_name),
            _ => None,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        assert_eq!(
            RuntimeError::arithmetic("/ by zero").to_string(),
            "java.lang.ArithmeticException: / by zero"
        );
        assert_eq!(RuntimeError::null_pointer().to_string(), "java.lang.NullPointerException");
    }
}

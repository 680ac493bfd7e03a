//! Errors raised while laying out class files
//!
//! These are limits of the class-file format rather than faults in the
//! fragment; the generator turns them into diagnostics at the offending
//! method.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Constant pool is out of space")]
    ConstantPoolOverflow,
    #[error("String constant too long: {length} characters")]
    StringTooLong { length: usize },
    #[error("Code of method exceeds 65535 bytes")]
    CodeTooLarge,
    #[error("Too many local variables")]
    TooManyLocals,
    #[error("Branch target too far: {offset}")]
    BranchTooFar { offset: i64 },
    #[error("Label used but never placed")]
    UnplacedLabel,
}

pub type CodegenResult<T> = Result<T, CodegenError>;

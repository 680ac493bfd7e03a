//! Abstract Syntax Tree (AST) for Java fragments
//!
//! The tree is an arena: a [`CompilationUnit`] owns every class, method and
//! field declaration, and declarations refer to each other through
//! [`ClassId`], [`MethodId`] and [`FieldId`] indices instead of pointers.
//! Statements and expressions are ordinary owned trees below a method.

mod nodes;
mod printer;

pub use nodes::*;
pub use printer::*;

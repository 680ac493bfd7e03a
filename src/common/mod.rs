//! Name and type lookup shared by the compiler passes

pub mod import;
pub mod type_resolver;

pub use import::{ImportResolver, ImportStatement};
pub use type_resolver::{ResolvedType, TypeResolver};

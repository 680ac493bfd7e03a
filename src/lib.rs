//! Embedded Java fragment compiler (tolc-eval)
//!
//! Compiles a bare expression, a statement sequence or a class body into JVM
//! class files in memory and runs them on the bundled host runtime.
//!
//! ## Architecture
//!
//! - **descriptor**: conversions between class names, internal names and descriptors
//! - **parser**: logos lexer, token scanner and recursive descent parser
//! - **ast**: arena syntax tree of a compilation unit
//! - **common**: import scopes and the type resolver over unit and host types
//! - **codegen**: signatures, typing and bytecode generation into class images
//! - **rt**: host runtime: system classes, class loader and interpreter
//! - **eval**: fragment wrappers, the compile/load pipeline, evaluators and the
//!   parameter guesser
//!
//! ## Evaluation Flow
//!
//! ```text
//! fragment → (guess parameters) → wrap into unit → enter → gen → class images
//!                                                                    ↓
//!                               result ← interpreter ← ByteArrayClassLoader
//! ```

pub mod ast;
pub mod codegen;
pub mod common;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod parser;
pub mod rt;

pub use config::Config;
pub use error::{Diagnostic, Error, Result};
pub use eval::{
    guess_parameter_names, ClassBodyEvaluator, ClassBodyOptions, EvaluatorOptions, ExpressionEvaluator, GuessMode,
    Instance, LoadedClass, ScriptEvaluator,
};
pub use rt::Value;

/// Compile and evaluate an expression once
pub fn evaluate_expression(source: &str, options: EvaluatorOptions, args: &[Value]) -> Result<Value> {
    ExpressionEvaluator::new(source, options)?.evaluate(args)
}

/// Compile and run a script once
pub fn evaluate_script(source: &str, options: EvaluatorOptions, args: &[Value]) -> Result<Value> {
    ScriptEvaluator::new(source, options)?.evaluate(args)
}

/// Compile a class body and load the resulting class
pub fn evaluate_class_body(source: &str, options: ClassBodyOptions) -> Result<LoadedClass> {
    Ok(ClassBodyEvaluator::new(source, options)?.into_class())
}

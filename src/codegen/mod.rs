//! Code generation
//!
//! Turns a parsed [`CompilationUnit`] into class files in three passes:
//! `enter` builds the signatures of every declaration, `attr` types
//! expressions on demand, and `gen` writes each class's bytecode.

pub mod attribute;
pub mod class;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod enter;
pub mod error;
pub mod opcodes;
pub mod writer;

mod attr;
mod gen;
mod gen_cond;
mod gen_expr;

pub use class::{ClassFile, FieldInfo, MethodInfo};
pub use constpool::{Constant, ConstantPool};
pub use enter::{enter, ClassSymbol, Symbols};
pub use error::{CodegenError, CodegenResult};
pub use writer::ClassfileWritable;

use log::{debug, trace};

use crate::ast::CompilationUnit;
use crate::common::import::ImportResolver;
use crate::common::type_resolver::TypeResolver;
use crate::config::Config;
use crate::error::{Error, Result};

/// One generated class: dotted binary name and class file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Compile every class declared in `unit`
///
/// Types are looked up through `resolver`, which is left knowing the unit's
/// own classes. All problems found are reported together as
/// [`Error::Compile`].
pub fn compile(unit: &CompilationUnit, resolver: &mut TypeResolver, config: &Config) -> Result<Vec<ClassImage>> {
    let mut imports = ImportResolver::new(&unit.imports);
    let mut symbols = enter(unit, resolver, &mut imports).map_err(|diagnostics| Error::Compile { diagnostics })?;
    gen::infer_return_types(unit, resolver, &mut imports, &mut symbols, config)
        .map_err(|diagnostics| Error::Compile { diagnostics })?;
    resolver.set_unit_types(symbols.unit_types(unit));

    let mut images = Vec::with_capacity(unit.classes.len());
    let mut diagnostics = Vec::new();
    for class_id in unit.class_ids() {
        let generator = gen::Gen::new(unit, resolver, &mut imports, &symbols, config, class_id);
        match generator.gen_class() {
            Ok(image) => {
                trace!("Generated {} ({} bytes)", image.name, image.bytes.len());
                images.push(image);
            }
            Err(found) => diagnostics.extend(found),
        }
    }
    if !diagnostics.is_empty() {
        debug!("Compilation failed with {} error(s)", diagnostics.len());
        diagnostics.sort_by_key(|d| d.location.offset);
        return Err(Error::Compile { diagnostics });
    }
    debug!("Compiled {} class(es)", images.len());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassDecl;
    use crate::parser::{Location, Parser, Scanner};
    use crate::rt::HostRuntime;

    /// Compile `body` as the body of class `SC`
    fn compile_body(body: &str) -> Result<Vec<ClassImage>> {
        let mut unit = CompilationUnit::new(None);
        let class = unit.add_class(ClassDecl::new("SC", Location::start()));
        let mut scanner = Scanner::new(body)?;
        let mut parser = Parser::new(&mut scanner);
        while !parser.is_at_end() {
            parser.parse_class_body_declaration(&mut unit, class)?;
        }
        let mut resolver = TypeResolver::new(HostRuntime::system());
        compile(&unit, &mut resolver, &Config::default())
    }

    fn messages(err: Error) -> Vec<String> {
        match err {
            Error::Compile { diagnostics } => diagnostics.into_iter().map(|d| d.message).collect(),
            other => panic!("expected a compile error, got {}", other),
        }
    }

    #[test]
    fn test_images_for_member_classes() {
        let images = compile_body("static class Inner { int x = 3; } int f() { return 1; }").unwrap();
        let names: Vec<_> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["SC", "SC$Inner"]);
        assert!(images.iter().all(|i| i.bytes.starts_with(&[0xCA, 0xFE, 0xBA, 0xBE])));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let err = compile_body("int f() { return y; } void g() { undefined(); }").unwrap_err();
        let messages = messages(err);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "cannot find symbol: variable y");
        assert!(messages[1].starts_with("cannot find symbol: method undefined"));
    }

    #[test]
    fn test_missing_return_and_unreachable_code() {
        let err = compile_body("int f(boolean b) { if (b) return 1; }").unwrap_err();
        assert_eq!(messages(err), vec!["missing return statement"]);
        let err = compile_body("int f() { return 1; int x = 2; }").unwrap_err();
        assert_eq!(messages(err), vec!["unreachable statement"]);
    }

    #[test]
    fn test_type_errors() {
        let err = compile_body("void f() { int x = \"a\"; }").unwrap_err();
        assert_eq!(messages(err), vec!["incompatible types: java.lang.String cannot be converted to int"]);
        let err = compile_body("void f() { byte b = 300; }").unwrap_err();
        assert_eq!(messages(err), vec!["incompatible types: possible lossy conversion from int to byte"]);
        let err = compile_body("void f() { 1 + 2; }").unwrap_err();
        assert_eq!(messages(err), vec!["not a statement"]);
    }

    #[test]
    fn test_final_assignment_is_rejected() {
        let err = compile_body("final int x = 1; void f() { x = 2; }").unwrap_err();
        assert_eq!(messages(err), vec!["cannot assign a value to final variable x"]);
        compile_body("final int x; SC() { x = 2; }").unwrap();
    }
}

//! Synthetic compilation units around fragments
//!
//! A fragment is never a complete compilation unit. The wrappers build the
//! missing structure (class declaration, method declaration, body) in the
//! arena and hand the caller's tokens to the parser at the right places.

use log::trace;

use crate::ast::*;
use crate::config::Config;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::parser::{Location, ParseError, Parser, Scanner};

/// Consume leading `import` declarations into `unit`
pub fn parse_import_declarations(unit: &mut CompilationUnit, scanner: &mut Scanner) -> Result<()> {
    while scanner.is_keyword("import") {
        let import = Parser::new(scanner).parse_import_declaration()?;
        unit.add_import(import);
    }
    Ok(())
}

/// Add the public top-level class that receives the fragment
///
/// `superclass` of `None` leaves the class extending `java.lang.Object`.
pub fn add_class_declaration(
    unit: &mut CompilationUnit,
    location: Location,
    name: &str,
    superclass: Option<&Descriptor>,
    interfaces: &[Descriptor],
) -> ClassId {
    let mut decl = ClassDecl::new(name, location);
    decl.modifiers.add(Modifier::Public);
    decl.extends = superclass.map(|d| TypeRef::Resolved(d.clone()));
    decl.implements = interfaces.iter().map(|d| TypeRef::Resolved(d.clone())).collect();
    unit.add_class(decl)
}

fn expect_end(scanner: &Scanner) -> Result<()> {
    if scanner.is_eof() {
        return Ok(());
    }
    let token = scanner.peek();
    Err(ParseError::unexpected_token("end of input", &token.describe(), token.location).into())
}

/// Name, superclass and interfaces of the synthesized class
#[derive(Debug, Clone, Default)]
pub struct ClassHeader {
    pub name: String,
    pub superclass: Option<Descriptor>,
    pub interfaces: Vec<Descriptor>,
}

impl ClassHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    fn declare(&self, unit: &mut CompilationUnit, location: Location) -> ClassId {
        add_class_declaration(unit, location, &self.name, self.superclass.as_ref(), &self.interfaces)
    }
}

/// Reads a class body: imports, then member declarations up to the end of input
#[derive(Debug, Clone)]
pub struct ClassBodyWrapper {
    pub header: ClassHeader,
}

impl ClassBodyWrapper {
    pub fn new(header: ClassHeader) -> Self {
        Self { header }
    }

    pub fn wrap(&self, source: &str, config: &Config) -> Result<CompilationUnit> {
        let mut scanner = Scanner::new(source)?;
        let mut unit = CompilationUnit::new(config.source_name.clone());
        parse_import_declarations(&mut unit, &mut scanner)?;
        let class = self.header.declare(&mut unit, scanner.location());
        let mut parser = Parser::new(&mut scanner);
        while !parser.is_at_end() {
            parser.parse_class_body_declaration(&mut unit, class)?;
        }
        trace!("Wrapped class body:\n{}", unparse(&unit));
        Ok(unit)
    }
}

/// What the method body is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// One expression, returned (or evaluated for effect when the method is `void`)
    Expression,
    /// A sequence of block statements
    Script,
}

/// Signature of the synthesized method
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: String,
    /// `None` lets the generator use the static type of the returned expression
    pub return_type: Option<Descriptor>,
    pub parameter_names: Vec<String>,
    pub parameter_types: Vec<Descriptor>,
    pub thrown_types: Vec<Descriptor>,
    pub is_static: bool,
}

impl MethodSignature {
    fn check(&self) -> Result<()> {
        if self.parameter_names.len() != self.parameter_types.len() {
            return Err(Error::invalid_signature(format!(
                "{} parameter name(s) but {} parameter type(s)",
                self.parameter_names.len(),
                self.parameter_types.len()
            )));
        }
        for (i, name) in self.parameter_names.iter().enumerate() {
            if self.parameter_names[..i].contains(name) {
                return Err(Error::invalid_signature(format!("duplicate parameter name {}", name)));
            }
        }
        Ok(())
    }

    fn parameters(&self, location: Location) -> Vec<Parameter> {
        self.parameter_names
            .iter()
            .zip(&self.parameter_types)
            .map(|(name, d)| Parameter {
                modifiers: Modifiers::new(&[Modifier::Final]),
                type_ref: TypeRef::Resolved(d.clone()),
                name: name.clone(),
                location,
            })
            .collect()
    }
}

/// Wraps an expression or a script into one public method of a class
#[derive(Debug, Clone)]
pub struct MethodWrapper {
    pub header: ClassHeader,
    pub signature: MethodSignature,
    pub kind: FragmentKind,
}

impl MethodWrapper {
    pub fn wrap(&self, source: &str, config: &Config) -> Result<CompilationUnit> {
        self.signature.check()?;
        let mut scanner = Scanner::new(source)?;
        let mut unit = CompilationUnit::new(config.source_name.clone());
        parse_import_declarations(&mut unit, &mut scanner)?;
        let location = scanner.location();
        let class = self.header.declare(&mut unit, location);
        let statements = match self.kind {
            FragmentKind::Expression => vec![self.expression_statement(&mut scanner)?],
            FragmentKind::Script => Parser::new(&mut scanner).parse_block_statements()?,
        };
        expect_end(&scanner)?;
        self.add_method(&mut unit, class, location, statements);
        trace!("Wrapped {:?} fragment:\n{}", self.kind, unparse(&unit));
        Ok(unit)
    }

    fn expression_statement(&self, scanner: &mut Scanner) -> Result<Stmt> {
        let location = scanner.location();
        let expr = Parser::new(scanner).parse_expression()?;
        let is_void = self.signature.return_type.as_ref().map_or(false, Descriptor::is_void);
        Ok(if is_void {
            Stmt::Expression(ExprStmt { expr, location })
        } else {
            Stmt::Return(ReturnStmt { value: Some(expr), location })
        })
    }

    fn return_type(&self) -> TypeRef {
        match (&self.signature.return_type, self.kind) {
            (Some(d), _) => TypeRef::Resolved(d.clone()),
            (None, FragmentKind::Expression) => TypeRef::Inferred,
            (None, FragmentKind::Script) => TypeRef::Resolved(Descriptor::void()),
        }
    }

    fn add_method(&self, unit: &mut CompilationUnit, class: ClassId, location: Location, statements: Vec<Stmt>) -> MethodId {
        let mut modifiers = Modifiers::new(&[Modifier::Public]);
        if self.signature.is_static {
            modifiers.add(Modifier::Static);
        }
        unit.add_method(MethodDecl {
            declaring_class: class,
            kind: MethodKind::Method,
            modifiers,
            return_type: self.return_type(),
            name: self.signature.name.clone(),
            parameters: self.signature.parameters(location),
            throws: self.signature.thrown_types.iter().map(|d| TypeRef::Resolved(d.clone())).collect(),
            explicit_invocation: None,
            body: Some(Block { statements, location }),
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(names: &[&str], types: &[Descriptor]) -> MethodSignature {
        MethodSignature {
            name: "eval".to_string(),
            return_type: None,
            parameter_names: names.iter().map(|n| n.to_string()).collect(),
            parameter_types: types.to_vec(),
            thrown_types: Vec::new(),
            is_static: true,
        }
    }

    fn wrapper(kind: FragmentKind, sig: MethodSignature) -> MethodWrapper {
        MethodWrapper { header: ClassHeader::new("SC"), signature: sig, kind }
    }

    #[test]
    fn test_expression_becomes_return() {
        let w = wrapper(FragmentKind::Expression, signature(&["a"], &[Descriptor::int()]));
        let unit = w.wrap("import java.util.Map;\na + 1", &Config::default()).unwrap();
        assert_eq!(unit.imports.len(), 1);
        assert_eq!(unit.type_decls.len(), 1);
        let class = unit.class(unit.type_decls[0]);
        assert!(class.modifiers.has(Modifier::Public));
        let method = unit.method(class.methods[0]);
        assert_eq!(method.return_type, TypeRef::Inferred);
        assert!(method.modifiers.is_static());
        assert!(method.parameters[0].modifiers.has(Modifier::Final));
        let body = method.body.as_ref().unwrap();
        assert!(matches!(body.statements.as_slice(), [Stmt::Return(_)]));
    }

    #[test]
    fn test_void_expression_is_a_statement() {
        let mut sig = signature(&[], &[]);
        sig.return_type = Some(Descriptor::void());
        let unit = wrapper(FragmentKind::Expression, sig).wrap("System.out.println(1)", &Config::default()).unwrap();
        let method = unit.method(MethodId(0));
        assert!(matches!(method.body.as_ref().unwrap().statements.as_slice(), [Stmt::Expression(_)]));
    }

    #[test]
    fn test_script_defaults_to_void() {
        let unit = wrapper(FragmentKind::Script, signature(&[], &[]))
            .wrap("int a = 1; a++;", &Config::default())
            .unwrap();
        let method = unit.method(MethodId(0));
        assert!(method.return_type.is_void());
        assert_eq!(method.body.as_ref().unwrap().statements.len(), 2);
    }

    #[test]
    fn test_signature_mismatch() {
        let w = wrapper(FragmentKind::Expression, signature(&["a", "b"], &[Descriptor::int()]));
        assert!(matches!(w.wrap("a", &Config::default()), Err(Error::InvalidSignature { .. })));
    }

    #[test]
    fn test_trailing_tokens_are_a_parse_error() {
        let w = wrapper(FragmentKind::Expression, signature(&[], &[]));
        let err = w.wrap("1 + 2 3", &Config::default()).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(1, 7, 6)));
        let w = wrapper(FragmentKind::Script, signature(&[], &[]));
        assert!(matches!(w.wrap("return; }", &Config::default()), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_class_body_header() {
        let mut header = ClassHeader::new("Rule");
        header.interfaces.push(Descriptor::from_class_name("java.lang.Runnable").unwrap());
        let unit = ClassBodyWrapper::new(header)
            .wrap("public void run() {} static class Helper {}", &Config::default().with_source_name("rule.java"))
            .unwrap();
        assert_eq!(unit.file_name.as_deref(), Some("rule.java"));
        let class = unit.class(ClassId(0));
        assert_eq!(class.name, "Rule");
        assert!(class.extends.is_none());
        assert_eq!(class.implements.len(), 1);
        assert_eq!(class.member_types.len(), 1);
    }
}

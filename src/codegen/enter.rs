//! Enter phase - symbol table construction and import checking
//!
//! Gives every class of the compilation unit its binary name, resolves class
//! headers and member signatures, and installs the result into the type
//! resolver so that attribution sees compiled and host classes as one
//! symbol space.

use log::{debug, trace};

use super::defs::access_flags::*;
use super::defs::CONSTRUCTOR_METHOD_NAME;
use crate::ast::*;
use crate::common::import::ImportResolver;
use crate::common::type_resolver::{
    FieldSignature, MethodSignature, ResolvedType, TypeKind, TypeOrigin, TypeResolver, UnitTypes,
};
use crate::descriptor::{Descriptor, THROWABLE};
use crate::error::Diagnostic;
use crate::parser::Location;

/// Entered view of one class declaration
#[derive(Debug, Clone)]
pub struct ClassSymbol {
    /// Dotted binary name: `SC`, `SC$Inner`
    pub binary_name: String,
    pub descriptor: Descriptor,
    /// Binary names of this class and its outer classes, innermost first
    pub enclosing: Vec<String>,
    pub access_flags: u16,
    /// `None` for interfaces
    pub super_type: Option<Descriptor>,
    pub interfaces: Vec<Descriptor>,
    /// No constructor declared: `<init>()V` is synthesized
    pub default_constructor: bool,
}

impl ClassSymbol {
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn internal_name(&self) -> String {
        self.binary_name.replace('.', "/")
    }
}

/// Signatures of every declaration, parallel to the unit's arenas
#[derive(Debug, Default)]
pub struct Symbols {
    pub classes: Vec<ClassSymbol>,
    pub methods: Vec<MethodSignature>,
    pub fields: Vec<FieldSignature>,
}

impl Symbols {
    pub fn class(&self, id: ClassId) -> &ClassSymbol {
        &self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &MethodSignature {
        &self.methods[id.0]
    }

    pub fn field(&self, id: FieldId) -> &FieldSignature {
        &self.fields[id.0]
    }

    /// Resolver view of the entered classes; members not entered yet are left out
    pub fn unit_types(&self, unit: &CompilationUnit) -> UnitTypes {
        let mut types = UnitTypes::new();
        for id in unit.class_ids() {
            let decl = unit.class(id);
            let symbol = self.class(id);
            let mut methods: Vec<MethodSignature> = decl
                .methods
                .iter()
                .chain(decl.constructors.iter())
                .filter_map(|m| self.methods.get(m.0).cloned())
                .collect();
            if symbol.default_constructor {
                methods.push(default_constructor());
            }
            let fields = decl.fields.iter().filter_map(|f| self.fields.get(f.0).cloned()).collect();
            types.insert(ResolvedType {
                descriptor: symbol.descriptor.clone(),
                name: symbol.binary_name.clone(),
                kind: if symbol.is_interface() { TypeKind::Interface } else { TypeKind::Class },
                access_flags: symbol.access_flags,
                super_type: symbol.super_type.clone(),
                interfaces: symbol.interfaces.clone(),
                methods,
                fields,
                origin: TypeOrigin::Compiled,
            });
        }
        types
    }
}

pub(super) fn default_constructor() -> MethodSignature {
    MethodSignature::new(CONSTRUCTOR_METHOD_NAME, Vec::new(), Descriptor::void(), ACC_PUBLIC)
}

/// Enter all declarations of `unit`
///
/// Methods whose return type is left to inference are entered as returning
/// `java.lang.Object`; the generator replaces that once bodies can be
/// attributed.
pub fn enter(
    unit: &CompilationUnit,
    resolver: &mut TypeResolver,
    imports: &mut ImportResolver,
) -> Result<Symbols, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let mut symbols = Symbols::default();

    for id in unit.class_ids() {
        let decl = unit.class(id);
        let binary_name = unit.binary_name(id);
        let descriptor = match Descriptor::from_class_name(&binary_name) {
            Ok(d) => d,
            Err(_) => {
                diagnostics.push(Diagnostic::new(decl.location, format!("illegal class name {}", binary_name)));
                Descriptor::object()
            }
        };
        if symbols.classes.iter().any(|c| c.binary_name == binary_name) {
            diagnostics.push(Diagnostic::new(decl.location, format!("duplicate class: {}", binary_name)));
        }
        let mut enclosing = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            enclosing.push(unit.binary_name(c));
            current = unit.class(c).outer;
        }
        trace!("Entering class {}", binary_name);
        symbols.classes.push(ClassSymbol {
            binary_name,
            descriptor,
            enclosing,
            access_flags: class_flags(decl),
            super_type: (!decl.is_interface).then(Descriptor::object),
            interfaces: Vec::new(),
            default_constructor: !decl.is_interface && decl.constructors.is_empty(),
        });
    }
    // Names first, so headers and signatures can mention any class of the unit
    resolver.set_unit_types(symbols.unit_types(unit));

    check_imports(unit, resolver, imports, &mut diagnostics);

    for id in unit.class_ids() {
        if let Err(d) = enter_header(unit, id, resolver, imports, &mut symbols) {
            diagnostics.push(d);
        }
    }
    check_cycles(unit, &symbols, &mut diagnostics);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    resolver.set_unit_types(symbols.unit_types(unit));

    for field in &unit.fields {
        let enclosing = &symbols.classes[field.declaring_class.0].enclosing;
        let descriptor = match resolve_type_ref(&field.type_ref, field.location, enclosing, imports, resolver) {
            Ok(d) if d.is_void() => {
                diagnostics.push(Diagnostic::new(field.location, format!("'void' type not allowed here: {}", field.name)));
                Descriptor::object()
            }
            Ok(d) => d,
            Err(d) => {
                diagnostics.push(d);
                Descriptor::object()
            }
        };
        let decl = unit.class(field.declaring_class);
        let duplicate = decl
            .fields
            .iter()
            .take_while(|f| f.0 < symbols.fields.len())
            .any(|f| symbols.fields[f.0].name == field.name);
        if duplicate {
            diagnostics.push(Diagnostic::new(
                field.location,
                format!("variable {} is already defined in class {}", field.name, decl.name),
            ));
        }
        symbols.fields.push(FieldSignature::new(field.name.clone(), descriptor, modifier_flags(&field.modifiers)));
    }

    for method in &unit.methods {
        let signature = enter_method(method, &symbols, resolver, imports, &mut diagnostics);
        let decl = unit.class(method.declaring_class);
        let duplicate = decl
            .methods
            .iter()
            .chain(decl.constructors.iter())
            .take_while(|m| m.0 < symbols.methods.len())
            .any(|m| symbols.methods[m.0].name == signature.name && symbols.methods[m.0].parameters == signature.parameters);
        if duplicate {
            let shown = if method.kind == MethodKind::Constructor { decl.name.as_str() } else { method.name.as_str() };
            diagnostics.push(Diagnostic::new(
                method.location,
                format!("method {}({}) is already defined in class {}", shown, display_list(&signature.parameters), decl.name),
            ));
        }
        symbols.methods.push(signature);
    }

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    resolver.set_unit_types(symbols.unit_types(unit));
    debug!(
        "Entered {} class(es), {} method(s), {} field(s)",
        symbols.classes.len(),
        symbols.methods.len(),
        symbols.fields.len()
    );
    Ok(symbols)
}

fn enter_header(
    unit: &CompilationUnit,
    id: ClassId,
    resolver: &mut TypeResolver,
    imports: &mut ImportResolver,
    symbols: &mut Symbols,
) -> Result<(), Diagnostic> {
    let decl = unit.class(id);
    // Supertypes are looked up from the enclosing scope, not the class itself
    let scope = symbols.classes[id.0].enclosing[1..].to_vec();
    if let Some(extends) = &decl.extends {
        let location = type_ref_location(extends, decl.location);
        let d = resolve_type_ref(extends, location, &scope, imports, resolver)?;
        let resolved = resolver.resolve(&d).map_err(|e| Diagnostic::new(location, e.to_string()))?;
        if resolved.is_interface() {
            return Err(Diagnostic::new(location, "no interface expected here"));
        }
        if !d.is_class_reference() {
            return Err(Diagnostic::new(location, format!("unexpected type: {}", display(&d))));
        }
        if resolved.access_flags & ACC_FINAL != 0 {
            return Err(Diagnostic::new(location, format!("cannot inherit from final {}", resolved.name)));
        }
        symbols.classes[id.0].super_type = Some(d);
    }
    let mut interfaces = Vec::with_capacity(decl.implements.len());
    for implemented in &decl.implements {
        let location = type_ref_location(implemented, decl.location);
        let d = resolve_type_ref(implemented, location, &scope, imports, resolver)?;
        let resolved = resolver.resolve(&d).map_err(|e| Diagnostic::new(location, e.to_string()))?;
        if !resolved.is_interface() {
            return Err(Diagnostic::new(location, "interface expected here"));
        }
        if interfaces.contains(&d) {
            return Err(Diagnostic::new(location, format!("repeated interface {}", resolved.name)));
        }
        interfaces.push(d);
    }
    symbols.classes[id.0].interfaces = interfaces;
    Ok(())
}

/// A class may not be its own superclass, directly or through other classes of the unit
fn check_cycles(unit: &CompilationUnit, symbols: &Symbols, diagnostics: &mut Vec<Diagnostic>) {
    for id in unit.class_ids() {
        let mut seen = vec![id];
        let mut current = symbols.class(id).super_type.clone();
        while let Some(d) = current {
            let Some(next) = unit.class_ids().find(|c| symbols.class(*c).descriptor == d) else {
                break;
            };
            if seen.contains(&next) {
                diagnostics.push(Diagnostic::new(
                    unit.class(id).location,
                    format!("cyclic inheritance involving {}", symbols.class(id).binary_name),
                ));
                break;
            }
            seen.push(next);
            current = symbols.class(next).super_type.clone();
        }
    }
}

fn enter_method(
    method: &MethodDecl,
    symbols: &Symbols,
    resolver: &mut TypeResolver,
    imports: &mut ImportResolver,
    diagnostics: &mut Vec<Diagnostic>,
) -> MethodSignature {
    let enclosing = &symbols.classes[method.declaring_class.0].enclosing;
    let mut parameters = Vec::with_capacity(method.parameters.len());
    for parameter in &method.parameters {
        match resolve_type_ref(&parameter.type_ref, parameter.location, enclosing, imports, resolver) {
            Ok(d) if d.is_void() => {
                diagnostics.push(Diagnostic::new(parameter.location, "'void' type not allowed here"));
                parameters.push(Descriptor::object());
            }
            Ok(d) => parameters.push(d),
            Err(d) => {
                diagnostics.push(d);
                parameters.push(Descriptor::object());
            }
        }
    }
    let return_type = match (&method.kind, &method.return_type) {
        (MethodKind::Constructor, _) => Descriptor::void(),
        (MethodKind::Method, TypeRef::Inferred) => Descriptor::object(),
        (MethodKind::Method, type_ref) => {
            match resolve_type_ref(type_ref, method.location, enclosing, imports, resolver) {
                Ok(d) => d,
                Err(d) => {
                    diagnostics.push(d);
                    Descriptor::object()
                }
            }
        }
    };
    for thrown in &method.throws {
        let location = type_ref_location(thrown, method.location);
        match resolve_type_ref(thrown, location, enclosing, imports, resolver) {
            Ok(d) => match resolver.is_subtype(&d, &Descriptor::known(THROWABLE)) {
                Ok(true) => {}
                Ok(false) => diagnostics.push(Diagnostic::new(
                    location,
                    format!("incompatible types: {} cannot be converted to java.lang.Throwable", display(&d)),
                )),
                Err(e) => diagnostics.push(Diagnostic::new(location, e.to_string())),
            },
            Err(d) => diagnostics.push(d),
        }
    }
    MethodSignature::new(method.name.clone(), parameters, return_type, modifier_flags(&method.modifiers))
}

fn check_imports(
    unit: &CompilationUnit,
    resolver: &mut TypeResolver,
    imports: &mut ImportResolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for import in &unit.imports {
        match import {
            ImportDecl::SingleType { name, location } => {
                if imports.resolve_type_name(name, &[], resolver).is_none() {
                    diagnostics.push(Diagnostic::new(*location, format!("cannot find symbol: class {}", name)));
                }
            }
            ImportDecl::OnDemand { .. } => {}
            ImportDecl::StaticSingle { type_name, member, location } => {
                let Some(owner) = imports.resolve_type_name(type_name, &[], resolver) else {
                    diagnostics.push(Diagnostic::new(*location, format!("cannot find symbol: class {}", type_name)));
                    continue;
                };
                let Ok(d) = Descriptor::from_class_name(&owner) else {
                    continue;
                };
                let has_field = matches!(resolver.find_field(&d, member), Ok(Some((_, f))) if f.is_static());
                let has_method = matches!(
                    resolver.find_methods(&d, member),
                    Ok(methods) if methods.iter().any(|(_, m)| m.is_static())
                );
                if !has_field && !has_method {
                    diagnostics.push(Diagnostic::new(
                        *location,
                        format!("cannot find symbol: static {} in {}", member, owner),
                    ));
                }
            }
            ImportDecl::StaticOnDemand { type_name, location } => {
                if imports.resolve_type_name(type_name, &[], resolver).is_none() {
                    diagnostics.push(Diagnostic::new(*location, format!("cannot find symbol: class {}", type_name)));
                }
            }
        }
    }
}

/// Descriptor of a type written in source, looked up from `enclosing`
pub(super) fn resolve_type_ref(
    type_ref: &TypeRef,
    fallback: Location,
    enclosing: &[String],
    imports: &mut ImportResolver,
    resolver: &mut TypeResolver,
) -> Result<Descriptor, Diagnostic> {
    match type_ref {
        TypeRef::Resolved(d) => {
            let mut element = d.clone();
            while let Some(component) = element.component() {
                element = component;
            }
            if element.is_class_reference() {
                resolver.resolve(&element).map_err(|e| Diagnostic::new(fallback, e.to_string()))?;
            }
            Ok(d.clone())
        }
        TypeRef::Inferred => Err(Diagnostic::new(fallback, "type cannot be inferred here")),
        TypeRef::Named { name, array_dims, location } => {
            let element = match primitive_descriptor(name) {
                Some(d) => d,
                None => {
                    let binary = imports
                        .resolve_type_name(name, enclosing, resolver)
                        .ok_or_else(|| Diagnostic::new(*location, format!("cannot find symbol: class {}", name)))?;
                    Descriptor::from_class_name(&binary).map_err(|e| Diagnostic::new(*location, e.to_string()))?
                }
            };
            if element.is_void() && *array_dims > 0 {
                return Err(Diagnostic::new(*location, "'void' type not allowed here"));
            }
            let mut d = element;
            for _ in 0..*array_dims {
                d = d.array_of();
            }
            Ok(d)
        }
    }
}

fn primitive_descriptor(name: &str) -> Option<Descriptor> {
    let d = match name {
        "void" => crate::descriptor::VOID,
        "boolean" => crate::descriptor::BOOLEAN,
        "byte" => crate::descriptor::BYTE,
        "char" => crate::descriptor::CHAR,
        "short" => crate::descriptor::SHORT,
        "int" => crate::descriptor::INT,
        "long" => crate::descriptor::LONG,
        "float" => crate::descriptor::FLOAT,
        "double" => crate::descriptor::DOUBLE,
        _ => return None,
    };
    Some(Descriptor::known(d))
}

pub(super) fn type_ref_location(type_ref: &TypeRef, fallback: Location) -> Location {
    match type_ref {
        TypeRef::Named { location, .. } => *location,
        _ => fallback,
    }
}

/// Access flags of a field or method
pub(super) fn modifier_flags(modifiers: &Modifiers) -> u16 {
    modifiers.0.iter().fold(0, |flags, m| {
        flags
            | match m {
                Modifier::Public => ACC_PUBLIC,
                Modifier::Protected => ACC_PROTECTED,
                Modifier::Private => ACC_PRIVATE,
                Modifier::Abstract => ACC_ABSTRACT,
                Modifier::Static => ACC_STATIC,
                Modifier::Final => ACC_FINAL,
                Modifier::Native => ACC_NATIVE,
                Modifier::Synchronized => ACC_SYNCHRONIZED,
                Modifier::Transient => ACC_TRANSIENT,
                Modifier::Volatile => ACC_VOLATILE,
                Modifier::Strictfp => ACC_STRICT,
            }
    })
}

/// Class-file access flags: only the top-level flag set is representable
fn class_flags(decl: &ClassDecl) -> u16 {
    let mut flags = 0;
    if decl.modifiers.has(Modifier::Public) {
        flags |= ACC_PUBLIC;
    }
    if decl.is_interface {
        flags |= ACC_INTERFACE | ACC_ABSTRACT;
    } else {
        flags |= ACC_SUPER;
        if decl.modifiers.has(Modifier::Final) {
            flags |= ACC_FINAL;
        }
        if decl.modifiers.is_abstract() {
            flags |= ACC_ABSTRACT;
        }
    }
    flags
}

/// Source-level rendering of a type for messages
pub(super) fn display(d: &Descriptor) -> String {
    if d.as_str() == super::attr::NULL_TYPE {
        return "<null>".to_string();
    }
    crate::descriptor::to_display_string(d.as_str()).unwrap_or_else(|_| d.to_string())
}

pub(super) fn display_list(types: &[Descriptor]) -> String {
    types.iter().map(display).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, Scanner};
    use crate::rt::HostRuntime;

    fn parse_class(body: &str) -> CompilationUnit {
        let mut unit = CompilationUnit::new(None);
        let class = unit.add_class(ClassDecl::new("SC", Location::start()));
        let mut scanner = Scanner::new(body).unwrap();
        let mut parser = Parser::new(&mut scanner);
        while !parser.is_at_end() {
            parser.parse_class_body_declaration(&mut unit, class).unwrap();
        }
        unit
    }

    fn enter_unit(unit: &CompilationUnit) -> (Result<Symbols, Vec<Diagnostic>>, TypeResolver) {
        let mut resolver = TypeResolver::new(HostRuntime::system());
        let mut imports = ImportResolver::new(&unit.imports);
        (enter(unit, &mut resolver, &mut imports), resolver)
    }

    #[test]
    fn test_members_and_default_constructor() {
        let unit = parse_class("int count; static String name(int a, double[] b) { return null; } static class Node { Node next; }");
        let (symbols, mut resolver) = enter_unit(&unit);
        let symbols = symbols.unwrap();
        assert_eq!(symbols.classes[1].binary_name, "SC$Node");
        assert_eq!(symbols.classes[1].enclosing, vec!["SC$Node".to_string(), "SC".to_string()]);
        assert_eq!(symbols.methods[0].descriptor(), "(I[D)Ljava/lang/String;");
        assert!(symbols.methods[0].is_static());
        assert_eq!(symbols.fields[1].descriptor.as_str(), "LSC$Node;");

        let sc = resolver.resolve(&Descriptor::from_class_name("SC").unwrap()).unwrap();
        assert_eq!(sc.origin, TypeOrigin::Compiled);
        assert!(sc.methods_named("<init>").any(|m| m.parameters.is_empty()));
    }

    #[test]
    fn test_unknown_type_is_reported_with_location() {
        let unit = parse_class("Missing field;");
        let (symbols, _) = enter_unit(&unit);
        let diagnostics = symbols.unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "cannot find symbol: class Missing");
        assert_eq!(diagnostics[0].location.line, 1);
    }

    #[test]
    fn test_header_kinds_are_checked() {
        let unit = parse_class("static class A implements Object {} static class B extends Runnable {}");
        let (symbols, _) = enter_unit(&unit);
        let messages: Vec<String> = symbols.unwrap_err().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["interface expected here", "no interface expected here"]);
    }

    #[test]
    fn test_duplicate_method() {
        let unit = parse_class("void m(int a) {} void m(int b) {}");
        let (symbols, _) = enter_unit(&unit);
        let diagnostics = symbols.unwrap_err();
        assert_eq!(diagnostics[0].message, "method m(int) is already defined in class SC");
    }
}

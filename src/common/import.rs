//! Import Statement Resolution
//!
//! Turns the type names written in a fragment into dotted binary names,
//! following the usual shadowing order: member types of enclosing classes,
//! top-level classes of the unit, single-type imports, `java.lang`, then
//! on-demand imports. Static imports are kept for member lookups.

use std::collections::HashMap;

use log::trace;

use crate::ast::ImportDecl;
use crate::common::type_resolver::TypeResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatement {
    /// `import java.util.List;`
    Single { fully_qualified_name: String, simple_name: String },
    /// `import java.util.*;`
    Star { package_name: String },
    /// `import static java.lang.Math.PI;`
    StaticSingle { class_name: String, member_name: String },
    /// `import static java.lang.Math.*;`
    StaticStar { class_name: String },
}

pub struct ImportResolver {
    imports: Vec<ImportStatement>,
    /// (innermost enclosing class, simple name) -> binary name
    cache: HashMap<(String, String), Option<String>>,
}

impl ImportResolver {
    pub fn new(imports: &[ImportDecl]) -> Self {
        let mut statements: Vec<ImportStatement> = imports
            .iter()
            .map(|decl| match decl {
                ImportDecl::SingleType { name, .. } => ImportStatement::Single {
                    fully_qualified_name: name.clone(),
                    simple_name: last_segment(name).to_string(),
                },
                ImportDecl::OnDemand { package, .. } => ImportStatement::Star { package_name: package.clone() },
                ImportDecl::StaticSingle { type_name, member, .. } => ImportStatement::StaticSingle {
                    class_name: type_name.clone(),
                    member_name: member.clone(),
                },
                ImportDecl::StaticOnDemand { type_name, .. } => {
                    ImportStatement::StaticStar { class_name: type_name.clone() }
                }
            })
            .collect();
        // Implicit java.lang.*
        statements.push(ImportStatement::Star { package_name: "java.lang".to_string() });
        Self { imports: statements, cache: HashMap::new() }
    }

    pub fn imports(&self) -> &[ImportStatement] {
        &self.imports
    }

    /// Binary name of the type written as `name` inside `enclosing`
    /// (binary names, innermost first)
    pub fn resolve_type_name(
        &mut self,
        name: &str,
        enclosing: &[String],
        types: &mut TypeResolver,
    ) -> Option<String> {
        let key = (enclosing.first().cloned().unwrap_or_default(), name.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let resolved = if name.contains('.') {
            self.resolve_qualified(name, enclosing, types)
        } else {
            self.resolve_simple(name, enclosing, types)
        };
        trace!("Type name {} resolved to {:?}", name, resolved);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn resolve_simple(&self, name: &str, enclosing: &[String], types: &mut TypeResolver) -> Option<String> {
        for outer in enclosing {
            let candidate = format!("{}${}", outer, name);
            if types.class_exists(&candidate) {
                return Some(candidate);
            }
        }
        if types.class_exists(name) {
            return Some(name.to_string());
        }
        for import in &self.imports {
            if let ImportStatement::Single { fully_qualified_name, simple_name } = import {
                if simple_name == name {
                    return resolve_dotted(fully_qualified_name, types);
                }
            }
        }
        for import in &self.imports {
            if let ImportStatement::Star { package_name } = import {
                // The "package" may itself be a type: `import a.Outer.*;`
                let candidate = format!("{}.{}", package_name, name);
                if types.class_exists(&candidate) {
                    return Some(candidate);
                }
                if let Some(outer) = resolve_dotted(package_name, types) {
                    let candidate = format!("{}${}", outer, name);
                    if types.class_exists(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    fn resolve_qualified(&mut self, name: &str, enclosing: &[String], types: &mut TypeResolver) -> Option<String> {
        if let Some(found) = resolve_dotted(name, types) {
            return Some(found);
        }
        // `Outer.Inner` where `Outer` is itself a simple name in scope
        let (first, rest) = name.split_once('.')?;
        let outer = self.resolve_simple(first, enclosing, types)?;
        let candidate = format!("{}${}", outer, rest.replace('.', "$"));
        types.class_exists(&candidate).then_some(candidate)
    }

    /// Types whose static member `member` is imported by name or on demand,
    /// single-member imports first
    pub fn static_member_owners(&self, member: &str, types: &mut TypeResolver) -> Vec<String> {
        let mut owners = Vec::new();
        for import in &self.imports {
            if let ImportStatement::StaticSingle { class_name, member_name } = import {
                if member_name == member {
                    owners.extend(resolve_dotted(class_name, types));
                }
            }
        }
        for import in &self.imports {
            if let ImportStatement::StaticStar { class_name } = import {
                owners.extend(resolve_dotted(class_name, types));
            }
        }
        owners
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// A fully qualified name, where trailing segments may be member types
fn resolve_dotted(name: &str, types: &mut TypeResolver) -> Option<String> {
    let segments: Vec<&str> = name.split('.').collect();
    for split in (1..=segments.len()).rev() {
        let mut candidate = segments[..split].join(".");
        for member in &segments[split..] {
            candidate.push('$');
            candidate.push_str(member);
        }
        if types.class_exists(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Location;
    use crate::rt::{HostClass, HostRuntime};
    use std::sync::Arc;

    fn types() -> TypeResolver {
        let runtime = HostRuntime::builder()
            .with_class(HostClass::class("demo.util.Box"))
            .with_class(HostClass::class("demo.util.Box$Entry"))
            .build();
        TypeResolver::new(runtime as Arc<dyn crate::rt::ClassLookup>)
    }

    #[test]
    fn test_java_lang_is_implicit() {
        let mut resolver = ImportResolver::new(&[]);
        let mut types = types();
        assert_eq!(resolver.resolve_type_name("String", &[], &mut types).as_deref(), Some("java.lang.String"));
        assert_eq!(resolver.resolve_type_name("Box", &[], &mut types), None);
    }

    #[test]
    fn test_single_and_on_demand_imports() {
        let imports = vec![
            ImportDecl::SingleType { name: "demo.util.Box".to_string(), location: Location::start() },
            ImportDecl::OnDemand { package: "demo.util.Box".to_string(), location: Location::start() },
        ];
        let mut resolver = ImportResolver::new(&imports);
        let mut types = types();
        assert_eq!(resolver.resolve_type_name("Box", &[], &mut types).as_deref(), Some("demo.util.Box"));
        assert_eq!(resolver.resolve_type_name("Entry", &[], &mut types).as_deref(), Some("demo.util.Box$Entry"));
        assert_eq!(resolver.resolve_type_name("Box.Entry", &[], &mut types).as_deref(), Some("demo.util.Box$Entry"));
        assert_eq!(
            resolver.resolve_type_name("demo.util.Box.Entry", &[], &mut types).as_deref(),
            Some("demo.util.Box$Entry")
        );
    }

    #[test]
    fn test_static_member_owners() {
        let imports = vec![
            ImportDecl::StaticSingle {
                type_name: "java.lang.Math".to_string(),
                member: "max".to_string(),
                location: Location::start(),
            },
            ImportDecl::StaticOnDemand { type_name: "java.lang.Integer".to_string(), location: Location::start() },
        ];
        let resolver = ImportResolver::new(&imports);
        let mut types = types();
        assert_eq!(resolver.static_member_owners("max", &mut types), vec!["java.lang.Math", "java.lang.Integer"]);
        assert_eq!(resolver.static_member_owners("parseInt", &mut types), vec!["java.lang.Integer"]);
    }
}

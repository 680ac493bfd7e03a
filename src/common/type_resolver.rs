//! Unified Type Resolution
//!
//! One lookup over two symbol spaces: the classes declared in the compilation
//! unit being compiled and the classes reachable through the host class
//! lookup. Code generation asks only "what is this descriptor", never where
//! the answer came from.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use crate::codegen::defs::access_flags::*;
use crate::consts::RESOLVER_MAX_HIERARCHY_STEPS;
use crate::descriptor::{parse_method_descriptor, Descriptor};
use crate::error::{Error, Result};
use crate::rt::{ClassLookup, RuntimeClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Array,
    Class,
    Interface,
}

/// Where a type's metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOrigin {
    Compiled,
    Host,
    /// Primitives and arrays
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub parameters: Vec<Descriptor>,
    pub return_type: Descriptor,
    pub access_flags: u16,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, parameters: Vec<Descriptor>, return_type: Descriptor, access_flags: u16) -> Self {
        Self { name: name.into(), parameters, return_type, access_flags }
    }

    pub fn descriptor(&self) -> String {
        crate::descriptor::method_descriptor(&self.parameters, &self.return_type)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSignature {
    pub name: String,
    pub descriptor: Descriptor,
    pub access_flags: u16,
}

impl FieldSignature {
    pub fn new(name: impl Into<String>, descriptor: Descriptor, access_flags: u16) -> Self {
        Self { name: name.into(), descriptor, access_flags }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

/// Compile-time view of a type
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub descriptor: Descriptor,
    /// Dotted binary name (`SC$Inner`, `int`, `[I`)
    pub name: String,
    pub kind: TypeKind,
    pub access_flags: u16,
    pub super_type: Option<Descriptor>,
    pub interfaces: Vec<Descriptor>,
    pub methods: Vec<MethodSignature>,
    pub fields: Vec<FieldSignature>,
    pub origin: TypeOrigin,
}

impl ResolvedType {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    pub fn internal_name(&self) -> String {
        self.descriptor.internal_name().unwrap_or_else(|| self.descriptor.as_str().to_string())
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodSignature> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSignature> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn primitive(descriptor: &Descriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            name: descriptor.class_name(),
            kind: TypeKind::Primitive,
            access_flags: ACC_PUBLIC | ACC_FINAL,
            super_type: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            origin: TypeOrigin::Synthesized,
        }
    }

    fn array(descriptor: &Descriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            name: descriptor.class_name(),
            kind: TypeKind::Array,
            access_flags: ACC_PUBLIC | ACC_FINAL,
            super_type: Some(Descriptor::object()),
            interfaces: vec![
                Descriptor::known(crate::descriptor::CLONEABLE),
                Descriptor::known(crate::descriptor::SERIALIZABLE),
            ],
            methods: Vec::new(),
            fields: vec![FieldSignature::new("length", Descriptor::int(), ACC_PUBLIC | ACC_FINAL)],
            origin: TypeOrigin::Synthesized,
        }
    }

    /// Metadata of a defined runtime class
    pub fn from_runtime_class(class: &RuntimeClass) -> Result<Self> {
        let descriptor = Descriptor::from_class_name(&class.name)?;
        let super_type = class.super_name.as_deref().map(Descriptor::from_class_name).transpose()?;
        let interfaces = class
            .interfaces
            .iter()
            .map(|name| Descriptor::from_class_name(name))
            .collect::<Result<Vec<_>>>()?;
        let mut methods = Vec::with_capacity(class.methods.len());
        for m in &class.methods {
            let (parameters, return_type) = parse_method_descriptor(&m.descriptor)?;
            methods.push(MethodSignature::new(m.name.clone(), parameters, return_type, m.access_flags));
        }
        let fields = class
            .fields
            .iter()
            .map(|f| FieldSignature::new(f.name.clone(), f.descriptor.clone(), f.access_flags))
            .collect();
        Ok(Self {
            descriptor,
            name: class.name.clone(),
            kind: if class.is_interface() { TypeKind::Interface } else { TypeKind::Class },
            access_flags: class.access_flags,
            super_type,
            interfaces,
            methods,
            fields,
            origin: TypeOrigin::Host,
        })
    }
}

/// One symbol space the resolver consults
pub trait TypeSource {
    /// `Ok(None)` when this source does not know the type
    fn lookup(&self, descriptor: &Descriptor) -> Result<Option<ResolvedType>>;

    fn name(&self) -> &'static str;
}

/// Types declared in the compilation unit being compiled
#[derive(Debug, Clone, Default)]
pub struct UnitTypes {
    types: HashMap<String, ResolvedType>,
}

impl UnitTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resolved: ResolvedType) {
        self.types.insert(resolved.descriptor.as_str().to_string(), resolved);
    }

    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.types.contains_key(descriptor.as_str())
    }

    pub fn get_mut(&mut self, descriptor: &Descriptor) -> Option<&mut ResolvedType> {
        self.types.get_mut(descriptor.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeSource for UnitTypes {
    fn lookup(&self, descriptor: &Descriptor) -> Result<Option<ResolvedType>> {
        Ok(self.types.get(descriptor.as_str()).cloned())
    }

    fn name(&self) -> &'static str {
        "unit"
    }
}

/// Types known to a host class lookup
pub struct HostTypes {
    lookup: Arc<dyn ClassLookup>,
}

impl HostTypes {
    pub fn new(lookup: Arc<dyn ClassLookup>) -> Self {
        Self { lookup }
    }
}

impl TypeSource for HostTypes {
    fn lookup(&self, descriptor: &Descriptor) -> Result<Option<ResolvedType>> {
        match self.lookup.find_class(&descriptor.class_name())? {
            Some(class) => ResolvedType::from_runtime_class(&class).map(Some),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

/// Caching resolver over the unit and host sources, in that order
///
/// Lives for one compilation: every lookup of one descriptor returns the same
/// `Arc`.
pub struct TypeResolver {
    unit: UnitTypes,
    host: HostTypes,
    cache: HashMap<String, Arc<ResolvedType>>,
}

impl TypeResolver {
    pub fn new(lookup: Arc<dyn ClassLookup>) -> Self {
        Self { unit: UnitTypes::new(), host: HostTypes::new(lookup), cache: HashMap::new() }
    }

    /// Install the declarations of the unit being compiled; drops cached entries
    pub fn set_unit_types(&mut self, unit: UnitTypes) {
        self.unit = unit;
        self.cache.clear();
    }

    pub fn unit_types(&self) -> &UnitTypes {
        &self.unit
    }

    fn sources(&self) -> [&dyn TypeSource; 2] {
        [&self.unit, &self.host]
    }

    pub fn resolve(&mut self, descriptor: &Descriptor) -> Result<Arc<ResolvedType>> {
        if let Some(hit) = self.cache.get(descriptor.as_str()) {
            return Ok(hit.clone());
        }
        let resolved = if descriptor.is_primitive() {
            ResolvedType::primitive(descriptor)
        } else if descriptor.is_array() {
            ResolvedType::array(descriptor)
        } else {
            self.lookup_sources(descriptor)?
                .ok_or_else(|| Error::type_not_found(descriptor.as_str()))?
        };
        let resolved = Arc::new(resolved);
        self.cache.insert(descriptor.as_str().to_string(), resolved.clone());
        Ok(resolved)
    }

    fn lookup_sources(&self, descriptor: &Descriptor) -> Result<Option<ResolvedType>> {
        for source in self.sources() {
            if let Some(found) = source.lookup(descriptor)? {
                trace!("Resolved {} from {} types", descriptor, source.name());
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Does the descriptor name a type; lookup failures count as absence
    pub fn exists(&mut self, descriptor: &Descriptor) -> bool {
        self.resolve(descriptor).is_ok()
    }

    /// Dotted-name convenience over [`exists`](Self::exists)
    pub fn class_exists(&mut self, class_name: &str) -> bool {
        match Descriptor::from_class_name(class_name) {
            Ok(d) => self.exists(&d),
            Err(_) => false,
        }
    }

    /// `sub` is `sup`, extends it or implements it
    pub fn is_subtype(&mut self, sub: &Descriptor, sup: &Descriptor) -> Result<bool> {
        if sub == sup {
            return Ok(true);
        }
        if sub.is_primitive() || sup.is_primitive() {
            return Ok(false);
        }
        if sup.as_str() == crate::descriptor::OBJECT {
            return Ok(true);
        }
        match (sub.component(), sup.component()) {
            (Some(a), Some(b)) => {
                if a.is_primitive() || b.is_primitive() {
                    Ok(a == b)
                } else {
                    self.is_subtype(&a, &b)
                }
            }
            (Some(_), None) => Ok(matches!(
                sup.as_str(),
                crate::descriptor::CLONEABLE | crate::descriptor::SERIALIZABLE
            )),
            (None, Some(_)) => Ok(false),
            (None, None) => Ok(self.supertypes(sub)?.iter().any(|t| &t.descriptor == sup)),
        }
    }

    /// `descriptor` and every class and interface above it, breadth first
    pub fn supertypes(&mut self, descriptor: &Descriptor) -> Result<Vec<Arc<ResolvedType>>> {
        let mut out: Vec<Arc<ResolvedType>> = Vec::new();
        let mut queue = std::collections::VecDeque::from([descriptor.clone()]);
        while let Some(next) = queue.pop_front() {
            if out.iter().any(|t| t.descriptor == next) {
                continue;
            }
            if out.len() > RESOLVER_MAX_HIERARCHY_STEPS {
                return Err(Error::type_not_found(format!("{} (cyclic hierarchy)", descriptor)));
            }
            let resolved = self.resolve(&next)?;
            queue.extend(resolved.super_type.iter().cloned());
            queue.extend(resolved.interfaces.iter().cloned());
            // Interfaces inherit the public methods of Object
            if resolved.is_interface() {
                queue.push_back(Descriptor::object());
            }
            out.push(resolved);
        }
        Ok(out)
    }

    /// Methods called `name` visible on `owner`; a signature declared lower
    /// in the hierarchy hides the same signature further up
    pub fn find_methods(&mut self, owner: &Descriptor, name: &str) -> Result<Vec<(Arc<ResolvedType>, MethodSignature)>> {
        let mut found: Vec<(Arc<ResolvedType>, MethodSignature)> = Vec::new();
        for t in self.supertypes(owner)? {
            for m in t.methods_named(name) {
                if !found.iter().any(|(_, f)| f.parameters == m.parameters) {
                    found.push((t.clone(), m.clone()));
                }
            }
        }
        Ok(found)
    }

    /// First field called `name` on `owner` or above, with its declaring type
    pub fn find_field(&mut self, owner: &Descriptor, name: &str) -> Result<Option<(Arc<ResolvedType>, FieldSignature)>> {
        for t in self.supertypes(owner)? {
            if let Some(f) = t.field(name) {
                return Ok(Some((t.clone(), f.clone())));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::HostRuntime;

    fn resolver() -> TypeResolver {
        TypeResolver::new(HostRuntime::system())
    }

    fn class(name: &str) -> Descriptor {
        Descriptor::from_class_name(name).unwrap()
    }

    #[test]
    fn test_repeated_lookups_share_one_handle() {
        let mut r = resolver();
        let a = r.resolve(&Descriptor::string()).unwrap();
        let b = r.resolve(&Descriptor::string()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.origin, TypeOrigin::Host);
        assert_eq!(a.name, "java.lang.String");
    }

    #[test]
    fn test_unit_types_shadow_host_types() {
        let mut r = resolver();
        let mut unit = UnitTypes::new();
        unit.insert(ResolvedType {
            descriptor: class("SC"),
            name: "SC".to_string(),
            kind: TypeKind::Class,
            access_flags: ACC_PUBLIC,
            super_type: Some(Descriptor::object()),
            interfaces: vec![class("java.lang.Runnable")],
            methods: vec![MethodSignature::new("run", vec![], Descriptor::void(), ACC_PUBLIC)],
            fields: Vec::new(),
            origin: TypeOrigin::Compiled,
        });
        r.set_unit_types(unit);
        let sc = r.resolve(&class("SC")).unwrap();
        assert_eq!(sc.origin, TypeOrigin::Compiled);
        assert!(r.is_subtype(&class("SC"), &class("java.lang.Runnable")).unwrap());
        assert!(!r.is_subtype(&class("SC"), &Descriptor::string()).unwrap());
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let mut r = resolver();
        assert!(matches!(r.resolve(&class("com.example.Nope")), Err(Error::TypeNotFound { .. })));
        assert!(!r.class_exists("com.example.Nope"));
        assert!(r.class_exists("java.lang.Math"));
    }

    #[test]
    fn test_arrays_are_synthesized() {
        let mut r = resolver();
        let d = Descriptor::new("[Ljava/lang/String;").unwrap();
        let array = r.resolve(&d).unwrap();
        assert_eq!(array.kind, TypeKind::Array);
        assert!(array.field("length").is_some());
        assert!(r.is_subtype(&d, &Descriptor::new("[Ljava/lang/Object;").unwrap()).unwrap());
        assert!(!r.is_subtype(&Descriptor::new("[I").unwrap(), &Descriptor::new("[J").unwrap()).unwrap());
        assert!(r.is_subtype(&d, &class("java.io.Serializable")).unwrap());
    }

    #[test]
    fn test_inherited_members() {
        let mut r = resolver();
        let npe = class("java.lang.NullPointerException");
        let methods = r.find_methods(&npe, "getMessage").unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].0.name, "java.lang.Throwable");
        let (owner, field) = r.find_field(&class("java.lang.Math"), "PI").unwrap().unwrap();
        assert_eq!(owner.name, "java.lang.Math");
        assert!(field.is_static());
        assert!(r.is_subtype(&npe, &class("java.lang.Throwable")).unwrap());
    }
}

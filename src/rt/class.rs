//! Runtime classes: what a class image or a host class turns into once defined

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::error::{RuntimeError, RuntimeResult};
use super::interp::Interpreter;
use super::reader::{ClassData, PoolEntry};
use super::value::{lock, ObjectRef, Value};
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::attribute_names;
use crate::descriptor::Descriptor;

/// Anything that can find a class by its dotted name
pub trait ClassLookup: Send + Sync {
    /// `Ok(None)` when the name is unknown to this lookup and its parents
    fn find_class(&self, name: &str) -> RuntimeResult<Option<Arc<RuntimeClass>>>;

    fn load_class(&self, name: &str) -> RuntimeResult<Arc<RuntimeClass>> {
        self.find_class(name)?.ok_or_else(|| RuntimeError::class_not_found(name))
    }
}

pub type NativeFn = Arc<dyn Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    pub line_numbers: Vec<(u16, u16)>,
}

impl Code {
    /// Source line of the instruction at `pc`
    pub fn line_at(&self, pc: usize) -> Option<u16> {
        self.line_numbers
            .iter()
            .filter(|(start, _)| (*start as usize) <= pc)
            .max_by_key(|(start, _)| *start)
            .map(|(_, line)| *line)
    }
}

#[derive(Clone)]
pub enum MethodBody {
    Bytecode(Code),
    /// Host implementation; receives `this` first for instance methods
    Native(NativeFn),
    Abstract,
}

pub struct RuntimeMethod {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub body: MethodBody,
    pub exceptions: Vec<String>,
}

impl RuntimeMethod {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0 || matches!(self.body, MethodBody::Abstract)
    }

    pub fn parameter_types(&self) -> RuntimeResult<(Vec<Descriptor>, Descriptor)> {
        crate::descriptor::parse_method_descriptor(&self.descriptor)
            .map_err(|e| RuntimeError::invalid_bytecode(&self.name, e.to_string()))
    }

    pub fn code(&self) -> Option<&Code> {
        match &self.body {
            MethodBody::Bytecode(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Debug for RuntimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeMethod")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("access_flags", &self.access_flags)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeField {
    pub name: String,
    pub descriptor: Descriptor,
    pub access_flags: u16,
}

impl RuntimeField {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    NotInitialized,
    InProgress,
    Done,
}

pub struct RuntimeClass {
    /// Dotted binary name, e.g. `SC$Inner`
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access_flags: u16,
    pub fields: Vec<RuntimeField>,
    pub methods: Vec<Arc<RuntimeMethod>>,
    pub source_file: Option<String>,
    pub(crate) pool: Vec<PoolEntry>,
    statics: Mutex<HashMap<String, Value>>,
    init_state: Mutex<InitState>,
    string_cache: Mutex<HashMap<u16, ObjectRef>>,
    loader: Option<Weak<dyn ClassLookup>>,
}

impl RuntimeClass {
    /// Turn a parsed class image into a runtime class owned by `loader`
    pub fn define(data: ClassData, loader: Weak<dyn ClassLookup>) -> RuntimeResult<Self> {
        let name = data.this_class.replace('/', ".");
        let invalid = |message: String| RuntimeError::invalid_bytecode(name.clone(), message);

        let mut fields = Vec::with_capacity(data.fields.len());
        for field in &data.fields {
            let descriptor = Descriptor::new(field.descriptor.clone()).map_err(|e| invalid(e.to_string()))?;
            fields.push(RuntimeField { name: field.name.clone(), descriptor, access_flags: field.access_flags });
        }

        let mut methods = Vec::with_capacity(data.methods.len());
        for method in &data.methods {
            let mut body = MethodBody::Abstract;
            let mut exceptions = Vec::new();
            for attribute in &method.attributes {
                match attribute.name.as_str() {
                    attribute_names::CODE => {
                        let code = super::reader::parse_code(&attribute.info, &data.pool).map_err(&invalid)?;
                        let mut line_numbers = Vec::new();
                        for nested in &code.attributes {
                            if nested.name == attribute_names::LINE_NUMBER_TABLE {
                                line_numbers = super::reader::parse_line_numbers(&nested.info).map_err(&invalid)?;
                            }
                        }
                        body = MethodBody::Bytecode(Code {
                            max_stack: code.max_stack,
                            max_locals: code.max_locals,
                            bytes: code.code,
                            line_numbers,
                        });
                    }
                    attribute_names::EXCEPTIONS => {
                        exceptions = super::reader::parse_exceptions(&attribute.info, &data.pool)
                            .map_err(&invalid)?
                            .into_iter()
                            .map(|n| n.replace('/', "."))
                            .collect();
                    }
                    _ => {}
                }
            }
            if matches!(body, MethodBody::Abstract) && method.access_flags & (ACC_ABSTRACT | ACC_NATIVE) == 0 {
                return Err(invalid(format!("method {}{} has no code", method.name, method.descriptor)));
            }
            methods.push(Arc::new(RuntimeMethod {
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                access_flags: method.access_flags,
                body,
                exceptions,
            }));
        }

        let source_file = data
            .attributes
            .iter()
            .find(|a| a.name == attribute_names::SOURCE_FILE)
            .and_then(|a| super::reader::parse_source_file(&a.info, &data.pool).ok());

        let mut class = RuntimeClass::new(name, data.super_class.map(|s| s.replace('/', ".")), data.access_flags);
        class.interfaces = data.interfaces.iter().map(|i| i.replace('/', ".")).collect();
        class.fields = fields;
        class.methods = methods;
        class.source_file = source_file;
        class.pool = data.pool;
        class.loader = Some(loader);
        Ok(class)
    }

    pub(crate) fn new(name: String, super_name: Option<String>, access_flags: u16) -> Self {
        Self {
            name,
            super_name,
            interfaces: Vec::new(),
            access_flags,
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
            pool: Vec::new(),
            statics: Mutex::new(HashMap::new()),
            init_state: Mutex::new(InitState::NotInitialized),
            string_cache: Mutex::new(HashMap::new()),
            loader: None,
        }
    }

    pub(crate) fn set_loader(&mut self, loader: Weak<dyn ClassLookup>) {
        self.loader = Some(loader);
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    /// Method declared directly in this class
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<Arc<RuntimeMethod>> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
            .cloned()
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<RuntimeMethod>> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn find_field(&self, name: &str) -> Option<&RuntimeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The lookup that defined this class, used to resolve its references
    pub fn loader(&self) -> RuntimeResult<Arc<dyn ClassLookup>> {
        self.loader
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| RuntimeError::LoaderDropped { class_name: self.name.clone() })
    }

    pub fn get_static(&self, name: &str) -> RuntimeResult<Value> {
        if let Some(value) = lock(&self.statics).get(name) {
            return Ok(value.clone());
        }
        match self.find_field(name) {
            Some(field) if field.is_static() => Ok(Value::default_for(&field.descriptor)),
            _ => Err(RuntimeError::no_such_field(&self.name, name)),
        }
    }

    pub fn set_static(&self, name: &str, value: Value) {
        lock(&self.statics).insert(name.to_string(), value);
    }

    /// Marks initialization as started; `false` if it already was
    pub(crate) fn begin_initialization(&self) -> bool {
        let mut state = lock(&self.init_state);
        if *state == InitState::NotInitialized {
            *state = InitState::InProgress;
            true
        } else {
            false
        }
    }

    pub(crate) fn finish_initialization(&self) {
        *lock(&self.init_state) = InitState::Done;
    }

    /// Interned `String` constant for a pool index
    pub(crate) fn string_constant(&self, index: u16, value: &str) -> ObjectRef {
        lock(&self.string_cache)
            .entry(index)
            .or_insert_with(|| Arc::new(super::value::Object::Str(value.to_string())))
            .clone()
    }

    pub(crate) fn pool_entry(&self, index: u16) -> RuntimeResult<&PoolEntry> {
        if index == 0 {
            return Err(RuntimeError::invalid_bytecode(&self.name, "constant pool index 0"));
        }
        self.pool
            .get(index as usize - 1)
            .ok_or_else(|| RuntimeError::invalid_bytecode(&self.name, format!("bad constant pool index {}", index)))
    }

    pub(crate) fn pool_utf8(&self, index: u16) -> RuntimeResult<&str> {
        match self.pool_entry(index)? {
            PoolEntry::Utf8(s) => Ok(s),
            other => Err(RuntimeError::invalid_bytecode(&self.name, format!("expected Utf8 at {}, found {:?}", index, other))),
        }
    }

    /// Dotted class name, or an array descriptor, of a `Class` entry
    pub(crate) fn pool_class_name(&self, index: u16) -> RuntimeResult<String> {
        match self.pool_entry(index)? {
            PoolEntry::Class(name_index) => Ok(self.pool_utf8(*name_index)?.replace('/', ".")),
            other => Err(RuntimeError::invalid_bytecode(&self.name, format!("expected Class at {}, found {:?}", index, other))),
        }
    }

    /// `(owner, name, descriptor)` of a field or method reference
    pub(crate) fn pool_member_ref(&self, index: u16) -> RuntimeResult<(String, String, String)> {
        let (class_index, nat_index) = match self.pool_entry(index)? {
            PoolEntry::FieldRef(c, n) | PoolEntry::MethodRef(c, n) | PoolEntry::InterfaceMethodRef(c, n) => (*c, *n),
            other => {
                return Err(RuntimeError::invalid_bytecode(
                    &self.name,
                    format!("expected member reference at {}, found {:?}", index, other),
                ))
            }
        };
        let owner = self.pool_class_name(class_index)?;
        match self.pool_entry(nat_index)? {
            PoolEntry::NameAndType(n, d) => Ok((owner, self.pool_utf8(*n)?.to_string(), self.pool_utf8(*d)?.to_string())),
            other => Err(RuntimeError::invalid_bytecode(&self.name, format!("expected NameAndType, found {:?}", other))),
        }
    }
}

impl fmt::Debug for RuntimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeClass")
            .field("name", &self.name)
            .field("super_name", &self.super_name)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods.iter().map(|m| format!("{}{}", m.name, m.descriptor)).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lookup_picks_closest_preceding_entry() {
        let code = Code { max_stack: 0, max_locals: 0, bytes: vec![], line_numbers: vec![(0, 1), (4, 2), (9, 3)] };
        assert_eq!(code.line_at(0), Some(1));
        assert_eq!(code.line_at(5), Some(2));
        assert_eq!(code.line_at(20), Some(3));
    }

    #[test]
    fn test_statics_default_until_assigned() {
        let mut class = RuntimeClass::new("C".to_string(), None, ACC_PUBLIC);
        class.fields.push(RuntimeField { name: "n".to_string(), descriptor: Descriptor::int(), access_flags: ACC_STATIC });
        assert_eq!(class.get_static("n").unwrap(), Value::Int(0));
        class.set_static("n", Value::Int(3));
        assert_eq!(class.get_static("n").unwrap(), Value::Int(3));
        assert!(class.get_static("missing").is_err());
        assert!(matches!(class.loader(), Err(RuntimeError::LoaderDropped { .. })));
    }
}

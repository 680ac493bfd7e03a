//! Compile, serialize, load
//!
//! A wrapped unit is compiled to class images, the images are handed to a
//! fresh [`ByteArrayClassLoader`] and the requested class is looked up
//! there. Nothing global is touched: every call gets its own loader and so
//! its own static state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::ast::CompilationUnit;
use crate::codegen;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::common::type_resolver::TypeResolver;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::rt::{ByteArrayClassLoader, ClassLookup, Interpreter, ObjectRef, RuntimeClass, RuntimeError, RuntimeMethod, Value};

/// Compile `unit` and load the class named `requested` from the result
///
/// `parent` resolves every class the unit does not declare itself, both
/// while compiling and while running.
pub fn compile_and_load(
    unit: &CompilationUnit,
    requested: &str,
    parent: Arc<dyn ClassLookup>,
    config: &Config,
) -> Result<LoadedClass> {
    let mut resolver = TypeResolver::new(parent.clone());
    let images = codegen::compile(unit, &mut resolver, config)?;
    let images: HashMap<String, Vec<u8>> = images.into_iter().map(|image| (image.name, image.bytes)).collect();
    debug!("Loading {} class image(s)", images.len());

    let loader = ByteArrayClassLoader::new(images, parent);
    if !loader.owns(requested) {
        return Err(Error::ClassNotDeclared {
            requested: requested.to_string(),
            declared: loader.class_names(),
        });
    }
    let class = loader.load_class(requested)?;
    debug!("Loaded class {}", class.name);
    Ok(LoadedClass { loader, class, max_call_depth: config.max_call_depth })
}

/// A compiled class, defined in its own loader
///
/// Cloning shares the loader, so clones see the same static state.
#[derive(Clone)]
pub struct LoadedClass {
    loader: Arc<ByteArrayClassLoader>,
    class: Arc<RuntimeClass>,
    max_call_depth: usize,
}

impl fmt::Debug for LoadedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedClass").field("name", &self.class.name).finish()
    }
}

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn runtime_class(&self) -> &Arc<RuntimeClass> {
        &self.class
    }

    /// The loader holding every class of the compilation; usable as the
    /// parent of a later evaluation
    pub fn loader(&self) -> Arc<dyn ClassLookup> {
        self.loader.clone()
    }

    pub fn declared_classes(&self) -> Vec<String> {
        self.loader.class_names()
    }

    /// Another class of the same compilation, such as a member class
    pub fn sibling(&self, name: &str) -> Result<LoadedClass> {
        if !self.loader.owns(name) {
            return Err(Error::ClassNotDeclared {
                requested: name.to_string(),
                declared: self.loader.class_names(),
            });
        }
        Ok(LoadedClass {
            loader: self.loader.clone(),
            class: self.loader.load_class(name)?,
            max_call_depth: self.max_call_depth,
        })
    }

    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.loader(), self.max_call_depth)
    }

    /// Construct an instance through the no-argument constructor
    ///
    /// A class that still has abstract methods is an
    /// [`Error::Instantiation`], not a runtime fault.
    pub fn instantiate(&self) -> Result<Instance> {
        let mut interpreter = self.interpreter();
        let missing = interpreter.missing_implementations(&self.class)?;
        if self.class.is_abstract() || self.class.is_interface() || !missing.is_empty() {
            return Err(Error::Instantiation { class_name: self.class.name.clone(), missing });
        }
        debug!("Instantiating {}", self.class.name);
        let object = interpreter.construct(&self.class, "()V", Vec::new())?;
        Ok(Instance { object, class: self.clone() })
    }

    /// Call the static method `name` taking `args.len()` parameters
    pub fn invoke_static(&self, name: &str, args: &[Value]) -> Result<Value> {
        let mut interpreter = self.interpreter();
        let method = find_method(&interpreter, &self.class, name, args.len())?;
        if !method.is_static() {
            return Err(RuntimeError::no_such_method(&self.class.name, name, &method.descriptor).into());
        }
        let (params, ret) = method.parameter_types()?;
        let args = coerce_arguments(args, &params)?;
        let result = interpreter.invoke_static(&self.class, name, &method.descriptor, args)?;
        Ok(result.from_stack(&ret))
    }

    /// Value of a static field, running the static initializer first
    pub fn get_static(&self, name: &str) -> Result<Value> {
        let mut interpreter = self.interpreter();
        interpreter.ensure_initialized(&self.class)?;
        let (owner, field) = interpreter.resolve_field(&self.class, name)?;
        Ok(owner.get_static(&field.name)?.from_stack(&field.descriptor))
    }
}

/// An object of a [`LoadedClass`]
#[derive(Clone)]
pub struct Instance {
    object: ObjectRef,
    class: LoadedClass,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("class", &self.class.name()).finish()
    }
}

impl Instance {
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn class(&self) -> &LoadedClass {
        &self.class
    }

    /// Virtual call of the method `name` taking `args.len()` parameters
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let mut interpreter = self.class.interpreter();
        let method = find_method(&interpreter, &self.class.class, name, args.len())?;
        let (params, ret) = method.parameter_types()?;
        let args = coerce_arguments(args, &params)?;
        let result = if method.is_static() {
            interpreter.invoke_static(&self.class.class, name, &method.descriptor, args)?
        } else {
            interpreter.invoke_virtual(&self.object, name, &method.descriptor, args)?
        };
        Ok(result.from_stack(&ret))
    }

    /// Value of an instance field declared in the class or a superclass
    pub fn get_field(&self, name: &str) -> Result<Value> {
        let interpreter = self.class.interpreter();
        let (owner, field) = interpreter.resolve_field(&self.class.class, name)?;
        let value = self.object.get_field(&owner.name, &field.name)?;
        Ok(value.from_stack(&field.descriptor))
    }

    /// `toString()` of the object
    pub fn to_java_string(&self) -> Result<String> {
        let mut interpreter = self.class.interpreter();
        Ok(interpreter.to_java_string(&Value::Ref(self.object.clone()))?)
    }
}

/// First method called `name` with `arity` parameters, searching the class,
/// its superclasses and then its interfaces
fn find_method(
    interpreter: &Interpreter,
    class: &Arc<RuntimeClass>,
    name: &str,
    arity: usize,
) -> Result<Arc<RuntimeMethod>> {
    if name == CONSTRUCTOR_METHOD_NAME {
        return Err(Error::invalid_signature("constructors are invoked through instantiate"));
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([class.clone()]);
    while let Some(c) = queue.pop_front() {
        if !seen.insert(c.name.clone()) {
            continue;
        }
        for method in c.methods_named(name) {
            if method.parameter_types()?.0.len() == arity {
                return Ok(method.clone());
            }
        }
        if let Some(super_class) = interpreter.super_class(&c)? {
            queue.push_back(super_class);
        }
        let loader = c.loader()?;
        for interface in &c.interfaces {
            queue.push_back(loader.load_class(interface)?);
        }
    }
    Err(RuntimeError::no_such_method(&class.name, name, format!("/{}", arity)).into())
}

fn coerce_arguments(args: &[Value], params: &[crate::descriptor::Descriptor]) -> Result<Vec<Value>> {
    if args.len() != params.len() {
        return Err(RuntimeError::argument_mismatch(format!(
            "expected {} argument(s), got {}",
            params.len(),
            args.len()
        ))
        .into());
    }
    let coerced = args
        .iter()
        .zip(params)
        .map(|(arg, d)| arg.clone().coerce_to(d))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::wrapper::{ClassBodyWrapper, ClassHeader};
    use crate::rt::HostRuntime;

    fn load(body: &str, requested: &str) -> Result<LoadedClass> {
        let config = Config::default();
        let unit = ClassBodyWrapper::new(ClassHeader::new("Foo")).wrap(body, &config)?;
        compile_and_load(&unit, requested, HostRuntime::system(), &config)
    }

    #[test]
    fn test_class_not_declared_names_both() {
        let err = load("int x;", "Bar").unwrap_err();
        match err {
            Error::ClassNotDeclared { requested, declared } => {
                assert_eq!(requested, "Bar");
                assert_eq!(declared, vec!["Foo".to_string()]);
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_invoke_static_and_instance_methods() {
        let class = load("static int twice(int x) { return 2 * x; } int k = 5; int plus(int y) { return k + y; }", "Foo").unwrap();
        assert_eq!(class.invoke_static("twice", &[Value::Int(21)]).unwrap(), Value::Int(42));
        let instance = class.instantiate().unwrap();
        assert_eq!(instance.invoke("plus", &[Value::Int(1)]).unwrap(), Value::Int(6));
        assert_eq!(instance.get_field("k").unwrap(), Value::Int(5));
        assert!(matches!(
            instance.invoke("plus", &[Value::Boolean(true)]),
            Err(Error::Runtime(RuntimeError::ArgumentMismatch { .. }))
        ));
    }

    #[test]
    fn test_member_class_is_reachable() {
        let class = load("static class Inner { static int v = 7; }", "Foo").unwrap();
        assert_eq!(class.declared_classes(), vec!["Foo".to_string(), "Foo$Inner".to_string()]);
        assert_eq!(class.sibling("Foo$Inner").unwrap().get_static("v").unwrap(), Value::Int(7));
    }
}

//! Fragment evaluators
//!
//! [`ExpressionEvaluator`], [`ScriptEvaluator`] and [`ClassBodyEvaluator`]
//! wrap a fragment into a compilation unit ([`wrapper`]), compile and load it
//! ([`pipeline`]) and hand back something callable. When no parameter names
//! are given, [`guesser`] proposes them.

pub mod class_body;
pub mod expression;
pub mod guesser;
pub mod pipeline;
pub mod script;
pub mod wrapper;

pub use class_body::{ClassBodyEvaluator, ClassBodyOptions};
pub use expression::ExpressionEvaluator;
pub use guesser::{guess_parameter_names, GuessMode};
pub use pipeline::{compile_and_load, Instance, LoadedClass};
pub use script::ScriptEvaluator;
pub use wrapper::{ClassBodyWrapper, ClassHeader, FragmentKind, MethodSignature, MethodWrapper};

use std::sync::Arc;

use log::debug;

use crate::config::Config;
use crate::descriptor::{parse_method_descriptor, Descriptor};
use crate::error::{Error, Result};
use crate::rt::{ClassLookup, HostRuntime, RuntimeError, Value};

/// Signature and environment of an expression or script
///
/// Everything is optional: without parameter names the fragment's free
/// variables become `java.lang.Object` parameters, and without a parent
/// lookup the system classes of [`HostRuntime::system`] are used.
#[derive(Clone)]
pub struct EvaluatorOptions {
    /// `None`: the expression's own type, or `void` for scripts
    pub return_type: Option<Descriptor>,
    pub parameter_names: Option<Vec<String>>,
    pub parameter_types: Vec<Descriptor>,
    pub thrown_types: Vec<Descriptor>,
    pub is_static: bool,
    pub extended_type: Option<Descriptor>,
    pub implemented_types: Vec<Descriptor>,
    pub parent: Option<Arc<dyn ClassLookup>>,
    pub config: Config,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            return_type: None,
            parameter_names: None,
            parameter_types: Vec::new(),
            thrown_types: Vec::new(),
            is_static: true,
            extended_type: None,
            implemented_types: Vec::new(),
            parent: None,
            config: Config::default(),
        }
    }
}

impl EvaluatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_return_type(mut self, d: Descriptor) -> Self {
        self.return_type = Some(d);
        self
    }

    pub fn with_parameters<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>, types: Vec<Descriptor>) -> Self {
        self.parameter_names = Some(names.into_iter().map(Into::into).collect());
        self.parameter_types = types;
        self
    }

    pub fn with_thrown_types(mut self, types: Vec<Descriptor>) -> Self {
        self.thrown_types = types;
        self
    }

    /// Compile the method as an instance method of a fresh object
    pub fn with_instance_method(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn extending(mut self, d: Descriptor) -> Self {
        self.extended_type = Some(d);
        self
    }

    pub fn implementing(mut self, d: Descriptor) -> Self {
        self.implemented_types.push(d);
        self
    }

    /// Resolve referenced classes through `parent`, for instance the loader
    /// of an earlier evaluation
    pub fn with_parent(mut self, parent: Arc<dyn ClassLookup>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    fn parent(&self) -> Arc<dyn ClassLookup> {
        self.parent.clone().unwrap_or_else(|| HostRuntime::system() as Arc<dyn ClassLookup>)
    }

    fn header(&self) -> ClassHeader {
        ClassHeader {
            name: self.config.class_name.clone(),
            superclass: self.extended_type.clone(),
            interfaces: self.implemented_types.clone(),
        }
    }

    /// Explicit names and types, or guessed names typed `Object`
    fn parameters(&self, source: &str, kind: FragmentKind) -> Result<(Vec<String>, Vec<Descriptor>)> {
        match &self.parameter_names {
            Some(names) => Ok((names.clone(), self.parameter_types.clone())),
            None if !self.parameter_types.is_empty() => {
                Err(Error::invalid_signature("parameter types given without parameter names"))
            }
            None => {
                let mode = match kind {
                    FragmentKind::Expression => GuessMode::Expression,
                    FragmentKind::Script => GuessMode::Script,
                };
                let names: Vec<String> = guess_parameter_names(source, mode)?.into_iter().collect();
                debug!("Using guessed parameters {:?}", names);
                let types = vec![Descriptor::object(); names.len()];
                Ok((names, types))
            }
        }
    }
}

enum Target {
    Static(LoadedClass),
    Instance(Instance),
}

/// An expression or script compiled into one method
pub(crate) struct CompiledMethod {
    target: Target,
    method_name: String,
    parameter_names: Vec<String>,
}

impl CompiledMethod {
    pub(crate) fn compile(source: &str, options: &EvaluatorOptions, kind: FragmentKind) -> Result<Self> {
        let (parameter_names, parameter_types) = options.parameters(source, kind)?;
        let wrapper = MethodWrapper {
            header: options.header(),
            signature: MethodSignature {
                name: options.config.method_name.clone(),
                return_type: options.return_type.clone(),
                parameter_names: parameter_names.clone(),
                parameter_types,
                thrown_types: options.thrown_types.clone(),
                is_static: options.is_static,
            },
            kind,
        };
        let unit = wrapper.wrap(source, &options.config)?;
        debug!("Parsed {:?} fragment into class {}", kind, options.config.class_name);
        let class = compile_and_load(&unit, &options.config.class_name, options.parent(), &options.config)?;
        let target = if options.is_static {
            Target::Static(class)
        } else {
            Target::Instance(class.instantiate()?)
        };
        Ok(Self { target, method_name: options.config.method_name.clone(), parameter_names })
    }

    pub(crate) fn evaluate(&self, args: &[Value]) -> Result<Value> {
        if args.len() != self.parameter_names.len() {
            return Err(RuntimeError::argument_mismatch(format!(
                "expected {} argument(s) for ({}), got {}",
                self.parameter_names.len(),
                self.parameter_names.join(", "),
                args.len()
            ))
            .into());
        }
        match &self.target {
            Target::Static(class) => class.invoke_static(&self.method_name, args),
            Target::Instance(instance) => instance.invoke(&self.method_name, args),
        }
    }

    pub(crate) fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub(crate) fn loaded_class(&self) -> &LoadedClass {
        match &self.target {
            Target::Static(class) => class,
            Target::Instance(instance) => instance.class(),
        }
    }
}

/// Compile `source` as the single abstract method of `interface` and
/// instantiate the result
pub(crate) fn create_fast_method(
    source: &str,
    interface: &str,
    options: &EvaluatorOptions,
    kind: FragmentKind,
) -> Result<Instance> {
    let parent = options.parent();
    let iface = parent.load_class(interface)?;
    if !iface.is_interface() {
        return Err(Error::invalid_signature(format!("{} is not an interface", interface)));
    }
    let mut abstract_methods = iface.methods.iter().filter(|m| m.is_abstract());
    let method = match (abstract_methods.next(), abstract_methods.next()) {
        (Some(m), None) => m.clone(),
        _ => {
            return Err(Error::invalid_signature(format!(
                "{} must declare exactly one abstract method",
                interface
            )))
        }
    };
    let (parameter_types, return_type) = parse_method_descriptor(&method.descriptor)?;
    let parameter_names = match &options.parameter_names {
        Some(names) => names.clone(),
        None => {
            let mode = if kind == FragmentKind::Script { GuessMode::Script } else { GuessMode::Expression };
            guess_parameter_names(source, mode)?.into_iter().collect()
        }
    };
    let wrapper = MethodWrapper {
        header: ClassHeader {
            name: options.config.class_name.clone(),
            superclass: options.extended_type.clone(),
            interfaces: vec![Descriptor::from_class_name(interface)?],
        },
        signature: MethodSignature {
            name: method.name.clone(),
            return_type: Some(return_type),
            parameter_names,
            parameter_types,
            thrown_types: options.thrown_types.clone(),
            is_static: false,
        },
        kind,
    };
    let unit = wrapper.wrap(source, &options.config)?;
    debug!("Implementing {}.{} with a {:?} fragment", interface, method.name, kind);
    compile_and_load(&unit, &options.config.class_name, parent, &options.config)?.instantiate()
}

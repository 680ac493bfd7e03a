//! Class bodies compiled into a loadable class

use std::sync::Arc;

use log::debug;

use super::pipeline::{compile_and_load, Instance, LoadedClass};
use super::wrapper::{ClassBodyWrapper, ClassHeader};
use crate::config::Config;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::rt::{ClassLookup, HostRuntime};

/// Header and environment of a class body
#[derive(Clone, Default)]
pub struct ClassBodyOptions {
    pub extended_type: Option<Descriptor>,
    pub implemented_types: Vec<Descriptor>,
    /// Lookup for referenced classes; the system classes when `None`
    pub parent: Option<Arc<dyn ClassLookup>>,
    pub config: Config,
}

impl ClassBodyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extending(mut self, d: Descriptor) -> Self {
        self.extended_type = Some(d);
        self
    }

    pub fn implementing(mut self, d: Descriptor) -> Self {
        self.implemented_types.push(d);
        self
    }

    pub fn with_parent(mut self, parent: Arc<dyn ClassLookup>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }
}

/// A class body compiled into class `Config::class_name`
pub struct ClassBodyEvaluator {
    class: LoadedClass,
}

impl ClassBodyEvaluator {
    pub fn new(source: &str, options: ClassBodyOptions) -> Result<Self> {
        let header = ClassHeader {
            name: options.config.class_name.clone(),
            superclass: options.extended_type.clone(),
            interfaces: options.implemented_types.clone(),
        };
        let unit = ClassBodyWrapper::new(header).wrap(source, &options.config)?;
        debug!("Parsed class body of {}", options.config.class_name);
        let parent = options.parent.clone().unwrap_or_else(|| HostRuntime::system() as Arc<dyn ClassLookup>);
        let class = compile_and_load(&unit, &options.config.class_name, parent, &options.config)?;
        Ok(Self { class })
    }

    /// The compiled class
    pub fn evaluate(&self) -> &LoadedClass {
        &self.class
    }

    pub fn into_class(self) -> LoadedClass {
        self.class
    }

    /// Compile `source` into a class extending or implementing `base_type`
    /// (a dotted name known to `parent`) and construct one instance
    ///
    /// A body that leaves an inherited abstract method unimplemented fails
    /// with [`Error::Instantiation`](crate::Error::Instantiation).
    pub fn create_fast(source: &str, base_type: Option<&str>, parent: Option<Arc<dyn ClassLookup>>) -> Result<Instance> {
        let parent = parent.unwrap_or_else(|| HostRuntime::system() as Arc<dyn ClassLookup>);
        let mut options = ClassBodyOptions::new().with_parent(parent.clone());
        if let Some(name) = base_type {
            let d = Descriptor::from_class_name(name)?;
            if parent.load_class(name)?.is_interface() {
                options = options.implementing(d);
            } else {
                options = options.extending(d);
            }
        }
        Self::new(source, options)?.class.instantiate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::rt::{HostClass, Value};

    #[test]
    fn test_static_method_of_class_body() {
        let cbe = ClassBodyEvaluator::new(
            "public static int fib(int n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }",
            ClassBodyOptions::new(),
        )
        .unwrap();
        assert_eq!(cbe.evaluate().invoke_static("fib", &[Value::Int(10)]).unwrap(), Value::Int(55));
    }

    #[test]
    fn test_create_fast_implements_host_interface() {
        let host: Arc<dyn ClassLookup> = HostRuntime::builder()
            .with_class(HostClass::interface("demo.Adder").abstract_method("add", "(II)I"))
            .build();
        let adder = ClassBodyEvaluator::create_fast(
            "public int add(int a, int b) { return a + b; }",
            Some("demo.Adder"),
            Some(host.clone()),
        )
        .unwrap();
        assert_eq!(adder.invoke("add", &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));

        let err = ClassBodyEvaluator::create_fast("public int sub(int a, int b) { return a - b; }", Some("demo.Adder"), Some(host))
            .unwrap_err();
        match err {
            Error::Instantiation { class_name, missing } => {
                assert_eq!(class_name, "SC");
                assert_eq!(missing, vec!["add(II)I".to_string()]);
            }
            other => panic!("unexpected {}", other),
        }
    }
}

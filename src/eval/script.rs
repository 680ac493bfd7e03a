//! Statement sequences compiled into a method body

use log::debug;

use super::pipeline::{Instance, LoadedClass};
use super::wrapper::FragmentKind;
use super::{create_fast_method, CompiledMethod, EvaluatorOptions};
use crate::error::Result;
use crate::rt::Value;

/// A compiled script
///
/// The script is the body of a method returning `void` unless
/// [`EvaluatorOptions::return_type`] says otherwise; a `void` script
/// evaluates to [`Value::Void`].
pub struct ScriptEvaluator {
    method: CompiledMethod,
}

impl ScriptEvaluator {
    pub fn new(source: &str, options: EvaluatorOptions) -> Result<Self> {
        let method = CompiledMethod::compile(source, &options, FragmentKind::Script)?;
        debug!("Compiled script with parameters {:?}", method.parameter_names());
        Ok(Self { method })
    }

    pub fn evaluate(&self, args: &[Value]) -> Result<Value> {
        self.method.evaluate(args)
    }

    pub fn parameter_names(&self) -> &[String] {
        self.method.parameter_names()
    }

    pub fn loaded_class(&self) -> &LoadedClass {
        self.method.loaded_class()
    }

    /// Like [`ExpressionEvaluator::create_fast`](super::ExpressionEvaluator::create_fast),
    /// with the script as the method body
    pub fn create_fast(source: &str, interface: &str, options: EvaluatorOptions) -> Result<Instance> {
        create_fast_method(source, interface, &options, FragmentKind::Script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    #[test]
    fn test_loop_with_return_value() {
        let options = EvaluatorOptions::new()
            .with_parameters(["n"], vec![Descriptor::int()])
            .with_return_type(Descriptor::int());
        let se = ScriptEvaluator::new("int sum = 0; for (int i = 1; i <= n; i++) sum += i; return sum;", options).unwrap();
        assert_eq!(se.evaluate(&[Value::Int(10)]).unwrap(), Value::Int(55));
    }

    #[test]
    fn test_void_script() {
        let se = ScriptEvaluator::new("int x = 1; x++;", EvaluatorOptions::new()).unwrap();
        assert!(se.parameter_names().is_empty());
        assert_eq!(se.evaluate(&[]).unwrap(), Value::Void);
    }
}

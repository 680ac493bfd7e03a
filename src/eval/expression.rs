//! Expressions compiled into a method returning their value

use log::debug;

use super::pipeline::{Instance, LoadedClass};
use super::wrapper::FragmentKind;
use super::{create_fast_method, CompiledMethod, EvaluatorOptions};
use crate::error::Result;
use crate::rt::Value;

/// A compiled expression, ready to be evaluated any number of times
///
/// ```no_run
/// use tolc_eval::descriptor::Descriptor;
/// use tolc_eval::eval::{EvaluatorOptions, ExpressionEvaluator};
/// use tolc_eval::rt::Value;
///
/// let options = EvaluatorOptions::new().with_parameters(["total"], vec![Descriptor::double()]);
/// let ee = ExpressionEvaluator::new("total >= 100.0 ? 0.0 : 7.95", options)?;
/// assert_eq!(ee.evaluate(&[Value::Double(7.0)])?, Value::Double(7.95));
/// # Ok::<(), tolc_eval::Error>(())
/// ```
pub struct ExpressionEvaluator {
    method: CompiledMethod,
}

impl ExpressionEvaluator {
    pub fn new(source: &str, options: EvaluatorOptions) -> Result<Self> {
        let method = CompiledMethod::compile(source, &options, FragmentKind::Expression)?;
        debug!("Compiled expression with parameters {:?}", method.parameter_names());
        Ok(Self { method })
    }

    /// Evaluate with one argument per parameter, in declaration order
    pub fn evaluate(&self, args: &[Value]) -> Result<Value> {
        self.method.evaluate(args)
    }

    /// Parameter names, as given or as guessed
    pub fn parameter_names(&self) -> &[String] {
        self.method.parameter_names()
    }

    pub fn loaded_class(&self) -> &LoadedClass {
        self.method.loaded_class()
    }

    /// Compile `source` as the implementation of the single abstract method of
    /// `interface` (a dotted name known to the parent lookup) and instantiate it
    ///
    /// Parameter types and the return type come from the interface method;
    /// `options` may still name the parameters.
    pub fn create_fast(source: &str, interface: &str, options: EvaluatorOptions) -> Result<Instance> {
        create_fast_method(source, interface, &options, FragmentKind::Expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::error::Error;
    use crate::rt::RuntimeError;

    #[test]
    fn test_typed_parameters() {
        let options = EvaluatorOptions::new().with_parameters(["a", "b"], vec![Descriptor::int(), Descriptor::long()]);
        let ee = ExpressionEvaluator::new("a * b + 1", options).unwrap();
        assert_eq!(ee.evaluate(&[Value::Int(6), Value::Long(7)]).unwrap(), Value::Long(43));
        assert_eq!(ee.loaded_class().name(), "SC");
    }

    #[test]
    fn test_guessed_parameters_are_objects() {
        let ee = ExpressionEvaluator::new("s == null ? \"none\" : \"some\"", EvaluatorOptions::new()).unwrap();
        assert_eq!(ee.parameter_names(), ["s".to_string()]);
        assert_eq!(ee.evaluate(&[Value::Null]).unwrap(), Value::string("none"));
    }

    #[test]
    fn test_wrong_argument_count() {
        let ee = ExpressionEvaluator::new("1", EvaluatorOptions::new()).unwrap();
        assert!(matches!(
            ee.evaluate(&[Value::Int(1)]),
            Err(Error::Runtime(RuntimeError::ArgumentMismatch { .. }))
        ));
    }

    #[test]
    fn test_explicit_return_type_converts() {
        let options = EvaluatorOptions::new()
            .with_parameters(["x"], vec![Descriptor::int()])
            .with_return_type(Descriptor::double());
        let ee = ExpressionEvaluator::new("x / 2", options).unwrap();
        assert_eq!(ee.evaluate(&[Value::Int(5)]).unwrap(), Value::Double(2.0));
    }
}

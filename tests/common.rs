// Common test utilities

use tolc_eval::descriptor::Descriptor;
use tolc_eval::EvaluatorOptions;

/// Route `log` output through the test harness; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Options declaring `names` with the given dotted type names
#[allow(dead_code)]
pub fn params(names: &[&str], types: &[&str]) -> EvaluatorOptions {
    let types = types
        .iter()
        .map(|t| Descriptor::from_class_name(t).expect("valid type name"))
        .collect();
    EvaluatorOptions::new().with_parameters(names.iter().copied(), types)
}

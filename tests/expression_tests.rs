mod common;

use common::{init_logging, params};
use tolc_eval::descriptor::Descriptor;
use tolc_eval::rt::{RuntimeError, Value};
use tolc_eval::{evaluate_expression, EvaluatorOptions, Error, ExpressionEvaluator};

#[test]
fn expression_shipping_demo() {
    init_logging();
    let ee = ExpressionEvaluator::new("total >= 100.0 ? 0.0 : 7.95", params(&["total"], &["double"])).unwrap();
    assert_eq!(ee.evaluate(&[Value::Double(99.0)]).unwrap(), Value::Double(7.95));
    assert_eq!(ee.evaluate(&[Value::Double(100.0)]).unwrap(), Value::Double(0.0));
    assert_eq!(ee.evaluate(&[Value::Int(150)]).unwrap(), Value::Double(0.0));
}

#[test]
fn expression_numeric_promotion() {
    init_logging();
    let v = evaluate_expression("a / b + c", params(&["a", "b", "c"], &["int", "int", "double"]), &[
        Value::Int(7),
        Value::Int(2),
        Value::Double(0.5),
    ])
    .unwrap();
    assert_eq!(v, Value::Double(3.5));
    let v = evaluate_expression("(byte) 200 + 'a'", EvaluatorOptions::new(), &[]).unwrap();
    assert_eq!(v, Value::Int(-56 + 97));
    let v = evaluate_expression("1L << 40 | 3", EvaluatorOptions::new(), &[]).unwrap();
    assert_eq!(v, Value::Long((1i64 << 40) | 3));
}

#[test]
fn expression_string_concatenation() {
    init_logging();
    let v = evaluate_expression(
        "name + \": \" + count + '/' + ratio + \" \" + flag + \" \" + nothing",
        params(&["name", "count", "ratio", "flag", "nothing"], &["java.lang.String", "int", "double", "boolean", "java.lang.Object"]),
        &[Value::string("hits"), Value::Int(3), Value::Double(0.5), Value::Boolean(true), Value::Null],
    )
    .unwrap();
    assert_eq!(v, Value::string("hits: 3/0.5 true null"));
}

#[test]
fn expression_calls_host_methods() {
    init_logging();
    let v = evaluate_expression(
        "Math.max(s.length(), Integer.parseInt(t)) + s.toUpperCase().charAt(0)",
        params(&["s", "t"], &["java.lang.String", "java.lang.String"]),
        &[Value::string("abc"), Value::string("10")],
    )
    .unwrap();
    assert_eq!(v, Value::Int(10 + 'A' as i32));
}

#[test]
fn expression_imports_are_honored() {
    init_logging();
    let v = evaluate_expression("import static java.lang.Math.abs;\nabs(x) * 2", params(&["x"], &["int"]), &[Value::Int(-4)])
        .unwrap();
    assert_eq!(v, Value::Int(8));
}

#[test]
fn expression_division_by_zero_is_an_exception() {
    init_logging();
    let err = evaluate_expression("1 / 0", EvaluatorOptions::new(), &[]).unwrap_err();
    match err {
        Error::Runtime(RuntimeError::Exception { class_name, message }) => {
            assert_eq!(class_name, "java.lang.ArithmeticException");
            assert_eq!(message.as_deref(), Some("/ by zero"));
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn expression_syntax_error_has_location() {
    init_logging();
    let err = ExpressionEvaluator::new("a +\n * b", params(&["a", "b"], &["int", "int"])).err().unwrap();
    assert!(matches!(err, Error::Parse { .. }));
    let location = err.location().unwrap();
    assert_eq!((location.line, location.column), (2, 2));
}

#[test]
fn expression_undefined_name_is_a_diagnostic() {
    init_logging();
    let err = ExpressionEvaluator::new("x + y", params(&["x"], &["int"])).err().unwrap();
    match err {
        Error::Compile { diagnostics } => {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].message, "cannot find symbol: variable y");
            assert_eq!(diagnostics[0].location.column, 5);
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn expression_unknown_type_in_signature() {
    init_logging();
    let options = EvaluatorOptions::new().with_parameters(["x"], vec![Descriptor::from_class_name("no.such.Type").unwrap()]);
    assert!(matches!(ExpressionEvaluator::new("x", options), Err(Error::Compile { .. })));
}

#[test]
fn expression_parameter_count_mismatch() {
    init_logging();
    let options = EvaluatorOptions::new().with_parameters(["a", "b"], vec![Descriptor::int()]);
    assert!(matches!(ExpressionEvaluator::new("a", options), Err(Error::InvalidSignature { .. })));
}

#[test]
fn expression_guessed_parameters() {
    init_logging();
    let ee = ExpressionEvaluator::new("a == null ? b : a", EvaluatorOptions::new()).unwrap();
    assert_eq!(ee.parameter_names(), ["a".to_string(), "b".to_string()]);
    assert_eq!(ee.evaluate(&[Value::Null, Value::string("fallback")]).unwrap(), Value::string("fallback"));
}

#[test]
fn expression_create_fast_implements_interface() {
    init_logging();
    let options = EvaluatorOptions::new().with_parameters(["o"], Vec::new());
    let comparable = ExpressionEvaluator::create_fast("o == null ? -1 : 1", "java.lang.Comparable", options).unwrap();
    assert_eq!(comparable.invoke("compareTo", &[Value::Null]).unwrap(), Value::Int(-1));
    assert_eq!(comparable.invoke("compareTo", &[Value::string("x")]).unwrap(), Value::Int(1));
}

#[test]
fn expression_as_instance_method() {
    init_logging();
    let ee = ExpressionEvaluator::new(
        "x * 2 + (this == null ? 1 : 0)",
        params(&["x"], &["int"]).with_instance_method(),
    )
    .unwrap();
    assert_eq!(ee.evaluate(&[Value::Int(21)]).unwrap(), Value::Int(42));
    assert_eq!(ee.loaded_class().name(), "SC");
}

#[test]
fn expression_null_comparisons_either_side() {
    init_logging();
    for source in ["s == null", "null == s"] {
        let ee = ExpressionEvaluator::new(source, params(&["s"], &["java.lang.String"])).unwrap();
        assert_eq!(ee.evaluate(&[Value::Null]).unwrap(), Value::Boolean(true), "{}", source);
        assert_eq!(ee.evaluate(&[Value::string("x")]).unwrap(), Value::Boolean(false), "{}", source);
    }
    let ee = ExpressionEvaluator::new(
        r#"s != null ? s.length() : -1"#,
        params(&["s"], &["java.lang.String"]),
    )
    .unwrap();
    assert_eq!(ee.evaluate(&[Value::string("abc")]).unwrap(), Value::Int(3));
    assert_eq!(ee.evaluate(&[Value::Null]).unwrap(), Value::Int(-1));
}

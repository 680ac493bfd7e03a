mod common;

use common::{init_logging, params};
use tolc_eval::descriptor::Descriptor;
use tolc_eval::rt::{RuntimeError, Value};
use tolc_eval::{evaluate_script, Error, EvaluatorOptions, ScriptEvaluator};

fn returning(options: EvaluatorOptions, d: Descriptor) -> EvaluatorOptions {
    options.with_return_type(d)
}

#[test]
fn script_loops_and_arrays() {
    init_logging();
    let source = r#"
        int[] squares = new int[n];
        for (int i = 0; i < squares.length; i++) {
            squares[i] = i * i;
        }
        int sum = 0, i = 0;
        while (true) {
            if (i == squares.length) break;
            if (squares[i] % 2 == 1) { i++; continue; }
            sum += squares[i++];
        }
        return sum;
    "#;
    let se = ScriptEvaluator::new(source, returning(params(&["n"], &["int"]), Descriptor::int())).unwrap();
    // 0 + 4 + 16 + 36
    assert_eq!(se.evaluate(&[Value::Int(7)]).unwrap(), Value::Int(56));
}

#[test]
fn script_do_while_and_long_arithmetic() {
    init_logging();
    let source = "long f = 1; int k = n; do { f *= k; k--; } while (k > 1); return f;";
    let v = evaluate_script(source, returning(params(&["n"], &["int"]), Descriptor::long()), &[Value::Int(20)]).unwrap();
    assert_eq!(v, Value::Long(2_432_902_008_176_640_000));
}

#[test]
fn script_array_initializers_and_strings() {
    init_logging();
    let source = r#"
        String[] words = { "alpha", "beta", "gamma" };
        String out = "";
        for (int i = words.length - 1; i >= 0; i--) {
            out += words[i].charAt(0);
        }
        return out;
    "#;
    let v = evaluate_script(source, returning(EvaluatorOptions::new(), Descriptor::string()), &[]).unwrap();
    assert_eq!(v, Value::string("gba"));
}

#[test]
fn script_throw_surfaces_exception() {
    init_logging();
    let source = "if (x < 0) throw new IllegalArgumentException(\"negative: \" + x);";
    let se = ScriptEvaluator::new(source, params(&["x"], &["int"])).unwrap();
    assert_eq!(se.evaluate(&[Value::Int(1)]).unwrap(), Value::Void);
    let err = se.evaluate(&[Value::Int(-2)]).unwrap_err();
    match err {
        Error::Runtime(RuntimeError::Exception { class_name, message }) => {
            assert_eq!(class_name, "java.lang.IllegalArgumentException");
            assert_eq!(message.as_deref(), Some("negative: -2"));
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn script_guesses_undeclared_names() {
    init_logging();
    let se = ScriptEvaluator::new(
        r#"int doubled = 2; String s = "" + prefix + doubled; return s;"#,
        returning(EvaluatorOptions::new(), Descriptor::string()),
    )
    .unwrap();
    assert_eq!(se.parameter_names(), ["prefix".to_string()]);
    assert_eq!(se.evaluate(&[Value::string("x")]).unwrap(), Value::string("x2"));
}

#[test]
fn script_missing_return_value() {
    init_logging();
    let err = ScriptEvaluator::new("if (b) return 1;", returning(params(&["b"], &["boolean"]), Descriptor::int()))
        .err()
        .unwrap();
    match err {
        Error::Compile { diagnostics } => assert_eq!(diagnostics[0].message, "missing return statement"),
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn script_deep_recursion_is_bounded() {
    init_logging();
    let source = "static int down(int n) { return n == 0 ? 0 : 1 + down(n - 1); }";
    let class = tolc_eval::evaluate_class_body(
        source,
        tolc_eval::ClassBodyOptions::new().with_config(tolc_eval::Config::new().with_max_call_depth(50)),
    )
    .unwrap();
    assert_eq!(class.invoke_static("down", &[Value::Int(10)]).unwrap(), Value::Int(10));
    assert!(matches!(
        class.invoke_static("down", &[Value::Int(100)]),
        Err(Error::Runtime(RuntimeError::StackOverflow { depth: 50 }))
    ));
}

#[test]
fn script_recursion_reaches_default_depth() {
    init_logging();
    let source = r#"
        static int down(int n) { return n == 0 ? 0 : 1 + down(n - 1); }
        int odd(int n) { return n == 0 ? 0 : even(n - 1); }
        int even(int n) { return n == 0 ? 1 : odd(n - 1); }
        static int parity(int n) { return new SC().even(n); }
    "#;
    let class = tolc_eval::evaluate_class_body(
        source,
        tolc_eval::ClassBodyOptions::new().with_config(tolc_eval::Config::new().with_class_name("SC")),
    )
    .unwrap();
    assert_eq!(class.invoke_static("down", &[Value::Int(100)]).unwrap(), Value::Int(100));
    assert_eq!(class.invoke_static("down", &[Value::Int(250)]).unwrap(), Value::Int(250));
    assert_eq!(class.invoke_static("parity", &[Value::Int(200)]).unwrap(), Value::Int(1));
    assert!(matches!(
        class.invoke_static("down", &[Value::Int(1000)]),
        Err(Error::Runtime(RuntimeError::StackOverflow { depth })) if depth == tolc_eval::consts::DEFAULT_MAX_CALL_DEPTH
    ));
    // the failed call leaves no depth behind
    assert_eq!(class.invoke_static("down", &[Value::Int(250)]).unwrap(), Value::Int(250));
}

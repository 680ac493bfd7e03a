mod common;

use std::sync::Arc;

use common::{init_logging, params};
use tolc_eval::descriptor::Descriptor;
use tolc_eval::rt::{ClassLookup, HostClass, HostRuntime, Value};
use tolc_eval::{ClassBodyEvaluator, ClassBodyOptions, Config, Error, ExpressionEvaluator};

const COUNTER: &str = r#"
    private static int counter;
    public static int next() { return ++counter; }
"#;

#[test]
fn class_body_evaluations_are_isolated() {
    init_logging();
    let first = ClassBodyEvaluator::new(COUNTER, ClassBodyOptions::new()).unwrap().into_class();
    let second = ClassBodyEvaluator::new(COUNTER, ClassBodyOptions::new()).unwrap().into_class();
    assert_eq!(first.invoke_static("next", &[]).unwrap(), Value::Int(1));
    assert_eq!(first.invoke_static("next", &[]).unwrap(), Value::Int(2));
    assert_eq!(second.invoke_static("next", &[]).unwrap(), Value::Int(1));
    assert!(!Arc::ptr_eq(first.runtime_class(), second.runtime_class()));
}

#[test]
fn class_body_fields_constructors_and_initializers() {
    init_logging();
    let source = r#"
        static final int BASE;
        static { BASE = 40; }
        private int offset = 1;
        { offset += 1; }
        public SC() { this(0); }
        public SC(int extra) { offset += extra; }
        public int value() { return BASE + offset; }
    "#;
    let class = ClassBodyEvaluator::new(source, ClassBodyOptions::new()).unwrap().into_class();
    let instance = class.instantiate().unwrap();
    assert_eq!(instance.invoke("value", &[]).unwrap(), Value::Int(42));
    assert_eq!(class.get_static("BASE").unwrap(), Value::Int(40));
}

#[test]
fn class_body_member_classes() {
    init_logging();
    let source = r#"
        static class Point {
            int x, y;
            Point(int x, int y) { this.x = x; this.y = y; }
            int manhattan() { return Math.abs(x) + Math.abs(y); }
        }
        interface Shape { double area(); }
        static class Square implements Shape {
            double side;
            Square(double side) { this.side = side; }
            public double area() { return side * side; }
        }
        public static int distance(int x, int y) { return new Point(x, y).manhattan(); }
        public static double area(double side) { Shape s = new Square(side); return s.area(); }
    "#;
    let class = ClassBodyEvaluator::new(source, ClassBodyOptions::new()).unwrap().into_class();
    assert_eq!(class.declared_classes(), vec!["SC", "SC$Point", "SC$Shape", "SC$Square"]);
    assert_eq!(class.invoke_static("distance", &[Value::Int(-3), Value::Int(4)]).unwrap(), Value::Int(7));
    assert_eq!(class.invoke_static("area", &[Value::Double(1.5)]).unwrap(), Value::Double(2.25));
}

#[test]
fn class_body_requested_class_must_be_declared() {
    init_logging();
    let options = ClassBodyOptions::new().with_config(Config::new().with_class_name("Foo"));
    let class = ClassBodyEvaluator::new("int x;", options).unwrap().into_class();
    let err = class.sibling("Bar").unwrap_err();
    match err {
        Error::ClassNotDeclared { requested, declared } => {
            assert_eq!(requested, "Bar");
            assert_eq!(declared, vec!["Foo".to_string()]);
        }
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn class_body_missing_interface_method_is_instantiation_error() {
    init_logging();
    let err = ClassBodyEvaluator::create_fast("public void walk() {}", Some("java.lang.Runnable"), None).unwrap_err();
    match &err {
        Error::Instantiation { class_name, missing } => {
            assert_eq!(class_name, "SC");
            assert_eq!(missing, &vec!["run()V".to_string()]);
        }
        other => panic!("unexpected {}", other),
    }
    assert!(err.to_string().starts_with("Cannot instantiate abstract class SC"));

    let runnable = ClassBodyEvaluator::create_fast("public int runs; public void run() { runs++; }", Some("java.lang.Runnable"), None)
        .unwrap();
    runnable.invoke("run", &[]).unwrap();
    runnable.invoke("run", &[]).unwrap();
    assert_eq!(runnable.get_field("runs").unwrap(), Value::Int(2));
}

#[test]
fn class_body_extends_host_class() {
    init_logging();
    let host: Arc<dyn ClassLookup> = HostRuntime::builder()
        .with_class(HostClass::class("demo.Shape").abstract_class().abstract_method("area", "()D").constructor("()V", |_, _| Ok(Value::Void)))
        .build();
    let shape = ClassBodyEvaluator::create_fast("public double area() { return 2.0 * 3.0; }", Some("demo.Shape"), Some(host)).unwrap();
    assert_eq!(shape.invoke("area", &[]).unwrap(), Value::Double(6.0));
    assert_eq!(shape.class().runtime_class().super_name.as_deref(), Some("demo.Shape"));
}

#[test]
fn class_body_loader_is_parent_scope() {
    init_logging();
    let options = ClassBodyOptions::new().with_config(Config::new().with_class_name("Lib"));
    let lib = ClassBodyEvaluator::new("public static int twice(int x) { return 2 * x; }", options).unwrap().into_class();
    let ee = ExpressionEvaluator::new("Lib.twice(v) + 1", params(&["v"], &["int"]).with_parent(lib.loader())).unwrap();
    assert_eq!(ee.evaluate(&[Value::Int(20)]).unwrap(), Value::Int(41));
}

#[test]
fn class_body_interface_types_resolve() {
    init_logging();
    let options = ClassBodyOptions::new().implementing(Descriptor::from_class_name("java.lang.Comparable").unwrap());
    let class = ClassBodyEvaluator::new("public int compareTo(Object o) { return 0; }", options).unwrap().into_class();
    assert_eq!(class.runtime_class().interfaces, vec!["java.lang.Comparable".to_string()]);
    let err = ClassBodyEvaluator::new("int x;", ClassBodyOptions::new().extending(Descriptor::from_class_name("java.lang.Runnable").unwrap()))
        .err()
        .unwrap();
    match err {
        Error::Compile { diagnostics } => assert_eq!(diagnostics[0].message, "no interface expected here"),
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn handles_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<tolc_eval::LoadedClass>();
    assert_send_sync::<tolc_eval::Instance>();
    assert_send_sync::<ExpressionEvaluator>();
    assert_send_sync::<tolc_eval::ScriptEvaluator>();
    assert_send_sync::<HostRuntime>();

    init_logging();
    let class = ClassBodyEvaluator::new(COUNTER, ClassBodyOptions::new()).unwrap().into_class();
    let worker = {
        let class = class.clone();
        std::thread::spawn(move || class.invoke_static("next", &[]).unwrap())
    };
    assert_eq!(worker.join().unwrap(), Value::Int(1));
    assert_eq!(class.invoke_static("next", &[]).unwrap(), Value::Int(2));
}

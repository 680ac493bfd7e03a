mod common;

use std::sync::Arc;

use common::init_logging;
use tolc_eval::codegen::{self, ClassImage};
use tolc_eval::common::TypeResolver;
use tolc_eval::descriptor::Descriptor;
use tolc_eval::rt::reader::{parse_class, parse_code, parse_line_numbers, ClassData};
use tolc_eval::rt::{ClassLookup, HostRuntime};
use tolc_eval::eval::{ClassHeader, FragmentKind, MethodSignature, MethodWrapper};
use tolc_eval::Config;

fn system() -> Arc<dyn ClassLookup> {
    HostRuntime::system()
}

fn compile_expression(source: &str, config: &Config) -> Vec<ClassImage> {
    let wrapper = MethodWrapper {
        header: ClassHeader::new(config.class_name.clone()),
        signature: MethodSignature {
            name: config.method_name.clone(),
            return_type: None,
            parameter_names: vec!["a".to_string(), "b".to_string()],
            parameter_types: vec![Descriptor::int(), Descriptor::int()],
            thrown_types: Vec::new(),
            is_static: true,
        },
        kind: FragmentKind::Expression,
    };
    let unit = wrapper.wrap(source, config).unwrap();
    let mut resolver = TypeResolver::new(system());
    codegen::compile(&unit, &mut resolver, config).unwrap()
}

fn line_numbers(class: &ClassData) -> Option<Vec<(u16, u16)>> {
    let method = class.method("eval", "(II)I").expect("eval method");
    let code = parse_code(&method.attribute("Code").expect("Code attribute").info, &class.pool).unwrap();
    code.attributes
        .iter()
        .find(|a| a.name == "LineNumberTable")
        .map(|a| parse_line_numbers(&a.info).unwrap())
}

#[test]
fn debug_attributes_follow_config() {
    init_logging();
    let source = "a *\n b +\n 1";

    let images = compile_expression(source, &Config::new());
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].name, "SC");
    let class = parse_class(&images[0].bytes).unwrap();
    assert_eq!(class.this_class, "SC");
    assert!(class.attributes.iter().any(|a| a.name == "SourceFile"));
    let lines = line_numbers(&class).expect("line numbers with debug on");
    assert_eq!(lines.first().map(|&(_, line)| line), Some(1));

    let images = compile_expression(source, &Config::new().with_debug(false));
    let class = parse_class(&images[0].bytes).unwrap();
    assert!(class.attributes.iter().all(|a| a.name != "SourceFile"));
    assert_eq!(line_numbers(&class), None);
}

#[test]
fn class_and_method_names_come_from_config() {
    init_logging();
    let config = Config::new().with_class_name("pkg.Calc").with_method_name("eval");
    let images = compile_expression("a - b", &config);
    assert_eq!(images[0].name, "pkg.Calc");
    let class = parse_class(&images[0].bytes).unwrap();
    assert_eq!(class.this_class, "pkg/Calc");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
}

#[test]
fn resolver_returns_shared_types() {
    init_logging();
    let mut resolver = TypeResolver::new(system());
    let first = resolver.resolve(&Descriptor::string()).unwrap();
    let second = resolver.resolve(&Descriptor::string()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(resolver.resolve(&Descriptor::from_class_name("no.such.Type").unwrap()).is_err());
}

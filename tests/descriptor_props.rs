use proptest::prelude::*;

use tolc_eval::descriptor::{self, parse_method_descriptor, Descriptor};

fn primitive_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("boolean"),
        Just("byte"),
        Just("char"),
        Just("short"),
        Just("int"),
        Just("long"),
        Just("float"),
        Just("double"),
    ]
}

fn class_name() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 0..3)
        .prop_flat_map(|packages| ("[A-Z][A-Za-z0-9]{0,8}", Just(packages)))
        .prop_map(|(simple, mut packages)| {
            packages.push(simple);
            packages.join(".")
        })
}

/// Names as `Class.getName()` spells them: `int`, `[I`, `[[Ljava.lang.String;`, `java.util.Map`
fn reflective_name() -> impl Strategy<Value = String> {
    let array_element = prop_oneof![
        "[BCDFIJSZ]".prop_map(String::from),
        class_name().prop_map(|n| format!("L{};", n)),
    ];
    prop_oneof![
        primitive_name().prop_map(String::from),
        class_name(),
        (1usize..4, array_element).prop_map(|(dims, element)| format!("{}{}", "[".repeat(dims), element)),
    ]
}

fn field_descriptor() -> impl Strategy<Value = Descriptor> {
    let element = prop_oneof![
        primitive_name().prop_map(|n| Descriptor::from_class_name(n).unwrap()),
        class_name().prop_map(|n| Descriptor::from_class_name(&n).unwrap()),
    ];
    (element, 0usize..3).prop_map(|(mut d, dims)| {
        for _ in 0..dims {
            d = d.array_of();
        }
        d
    })
}

proptest! {
    #[test]
    fn class_names_survive_conversion(name in class_name()) {
        let d = descriptor::from_class_name(&name).unwrap();
        prop_assert_eq!(descriptor::to_class_name(&d).unwrap(), name.clone());
        let internal = descriptor::to_internal_form(&d).unwrap();
        prop_assert_eq!(descriptor::from_internal_form(&internal).unwrap(), d);
        prop_assert_eq!(internal, name.replace('.', "/"));
    }

    #[test]
    fn reflective_names_survive_conversion(name in reflective_name()) {
        let d = descriptor::from_class_name(&name).unwrap();
        prop_assert!(Descriptor::new(d.as_str()).is_ok());
        prop_assert_eq!(descriptor::to_class_name(&d).unwrap(), name);
    }

    #[test]
    fn descriptors_survive_class_name_conversion(d in field_descriptor()) {
        let name = descriptor::to_class_name(d.as_str()).unwrap();
        prop_assert_eq!(descriptor::from_class_name(&name).unwrap(), d.as_str());
    }

    #[test]
    fn field_descriptors_validate(d in field_descriptor()) {
        prop_assert_eq!(Descriptor::new(d.as_str()).unwrap(), d.clone());
        prop_assert_eq!(descriptor::size(d.as_str()).unwrap(), d.size());
        prop_assert!(d.is_primitive() != d.is_reference());
    }

    #[test]
    fn method_descriptors_split(params in proptest::collection::vec(field_descriptor(), 0..5), ret in field_descriptor()) {
        let text = descriptor::method_descriptor(&params, &ret);
        let (parsed, parsed_ret) = parse_method_descriptor(&text).unwrap();
        prop_assert_eq!(parsed, params);
        prop_assert_eq!(parsed_ret, ret);
    }

    #[test]
    fn garbage_is_rejected(text in "[^BCDFIJSZLV\\[(]{1,8}") {
        prop_assert!(Descriptor::new(text.as_str()).is_err());
    }
}

#[test]
fn wide_types_take_two_slots() {
    assert_eq!(descriptor::size(descriptor::LONG).unwrap(), 2);
    assert_eq!(descriptor::size(descriptor::DOUBLE).unwrap(), 2);
    assert_eq!(descriptor::size(descriptor::VOID).unwrap(), 0);
    assert_eq!(descriptor::size("[J").unwrap(), 1);
    assert!(descriptor::size("Q").is_err());
    assert!(descriptor::size("Ljava/lang/String").is_err());
}

#[test]
fn malformed_names_are_rejected() {
    assert!(descriptor::to_class_name("[Q").is_err());
    assert!(descriptor::to_class_name("[").is_err());
    assert!(descriptor::from_class_name("[Q").is_err());
    assert!(descriptor::from_class_name("[L;").is_err());
}

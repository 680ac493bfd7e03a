//! Host runtime: the native system classes compiled fragments link against

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::class::{ClassLookup, MethodBody, NativeFn, RuntimeClass, RuntimeField, RuntimeMethod};
use super::error::{RuntimeError, RuntimeResult};
use super::interp::Interpreter;
use super::value::{format_char, format_double, format_float, lock, Object, ObjectRef, Value};
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::descriptor::Descriptor;

const OBJECT: &str = "java.lang.Object";
const THROWABLE: &str = "java.lang.Throwable";
const PRINT_STREAM: &str = "java.io.PrintStream";

/// Builder for one native class
pub struct HostClass {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    fields: Vec<RuntimeField>,
    methods: Vec<RuntimeMethod>,
    statics: Vec<(String, Value)>,
}

impl HostClass {
    /// Public class extending `java.lang.Object`
    pub fn class(name: impl Into<String>) -> Self {
        let name = name.into();
        let super_name = (name != OBJECT).then(|| OBJECT.to_string());
        Self {
            name,
            super_name,
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            fields: Vec::new(),
            methods: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        let mut class = Self::class(name);
        class.access_flags = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        class
    }

    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.access_flags |= ACC_ABSTRACT;
        self
    }

    pub fn abstract_method(mut self, name: &str, descriptor: &str) -> Self {
        self.methods.push(RuntimeMethod {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: ACC_PUBLIC | ACC_ABSTRACT,
            body: MethodBody::Abstract,
            exceptions: Vec::new(),
        });
        self
    }

    fn native<F>(mut self, name: &str, descriptor: &str, access_flags: u16, f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        let f: NativeFn = Arc::new(f);
        self.methods.push(RuntimeMethod {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            body: MethodBody::Native(f),
            exceptions: Vec::new(),
        });
        self
    }

    /// Instance method; `args[0]` is the receiver
    pub fn method<F>(self, name: &str, descriptor: &str, f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.native(name, descriptor, ACC_PUBLIC, f)
    }

    pub fn static_method<F>(self, name: &str, descriptor: &str, f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.native(name, descriptor, ACC_PUBLIC | ACC_STATIC, f)
    }

    /// `args[0]` is the freshly allocated object
    pub fn constructor<F>(self, descriptor: &str, f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.native(CONSTRUCTOR_METHOD_NAME, descriptor, ACC_PUBLIC, f)
    }

    pub fn field(mut self, name: &str, descriptor: Descriptor) -> Self {
        self.fields.push(RuntimeField { name: name.to_string(), descriptor, access_flags: ACC_PUBLIC });
        self
    }

    /// `public static final` constant
    pub fn static_field(mut self, name: &str, descriptor: Descriptor, value: Value) -> Self {
        self.fields.push(RuntimeField {
            name: name.to_string(),
            descriptor,
            access_flags: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
        });
        self.statics.push((name.to_string(), value.to_stack()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn build(mut self, loader: Weak<dyn ClassLookup>) -> RuntimeClass {
        let has_constructor = self.methods.iter().any(|m| m.name == CONSTRUCTOR_METHOD_NAME);
        if !has_constructor && self.access_flags & ACC_INTERFACE == 0 {
            self = self.constructor("()V", |_, _| Ok(Value::Void));
        }
        let mut class = RuntimeClass::new(self.name, self.super_name, self.access_flags);
        class.interfaces = self.interfaces;
        class.fields = self.fields;
        class.methods = self.methods.into_iter().map(Arc::new).collect();
        for (name, value) in self.statics {
            class.set_static(&name, value);
        }
        class.set_loader(loader);
        class
    }
}

/// Registry of native classes; the root of every class lookup chain
pub struct HostRuntime {
    classes: HashMap<String, Arc<RuntimeClass>>,
}

pub struct HostRuntimeBuilder {
    classes: Vec<HostClass>,
}

impl HostRuntimeBuilder {
    /// Add or replace a class
    pub fn with_class(mut self, class: HostClass) -> Self {
        self.classes.retain(|c| c.name != class.name);
        self.classes.push(class);
        self
    }

    pub fn build(self) -> Arc<HostRuntime> {
        let runtime = Arc::new_cyclic(|this: &Weak<HostRuntime>| {
            let loader: Weak<dyn ClassLookup> = this.clone();
            let classes = self
                .classes
                .into_iter()
                .map(|c| (c.name.clone(), Arc::new(c.build(loader.clone()))))
                .collect();
            HostRuntime { classes }
        });
        runtime.install_streams();
        runtime
    }
}

impl HostRuntime {
    /// Builder preloaded with the system classes
    pub fn builder() -> HostRuntimeBuilder {
        HostRuntimeBuilder { classes: system_classes() }
    }

    /// Shared runtime holding only the system classes
    pub fn system() -> Arc<HostRuntime> {
        static SYSTEM: OnceLock<Arc<HostRuntime>> = OnceLock::new();
        SYSTEM.get_or_init(|| HostRuntime::builder().build()).clone()
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.keys().cloned().collect();
        names.sort();
        names
    }

    fn install_streams(&self) {
        let (Some(system), Some(stream)) = (self.classes.get("java.lang.System"), self.classes.get(PRINT_STREAM)) else {
            return;
        };
        for (name, fd) in [("out", 1), ("err", 2)] {
            let mut fields = HashMap::new();
            fields.insert((PRINT_STREAM.to_string(), "fd".to_string()), Value::Int(fd));
            let object = Object::Instance { class: stream.clone(), fields: Mutex::new(fields) };
            system.set_static(name, Value::Ref(Arc::new(object)));
        }
    }
}

impl ClassLookup for HostRuntime {
    fn find_class(&self, name: &str) -> RuntimeResult<Option<Arc<RuntimeClass>>> {
        Ok(self.classes.get(name).cloned())
    }
}

fn arg(args: &[Value], i: usize) -> RuntimeResult<&Value> {
    args.get(i)
        .ok_or_else(|| RuntimeError::argument_mismatch(format!("missing argument {}", i)))
}

fn int_arg(args: &[Value], i: usize) -> RuntimeResult<i32> {
    let v = arg(args, i)?;
    v.as_int()
        .ok_or_else(|| RuntimeError::argument_mismatch(format!("expected int, found {}", v.type_name())))
}

fn long_arg(args: &[Value], i: usize) -> RuntimeResult<i64> {
    let v = arg(args, i)?;
    v.as_long()
        .ok_or_else(|| RuntimeError::argument_mismatch(format!("expected long, found {}", v.type_name())))
}

fn float_arg(args: &[Value], i: usize) -> RuntimeResult<f32> {
    let v = arg(args, i)?;
    v.as_float()
        .ok_or_else(|| RuntimeError::argument_mismatch(format!("expected float, found {}", v.type_name())))
}

fn double_arg(args: &[Value], i: usize) -> RuntimeResult<f64> {
    let v = arg(args, i)?;
    v.as_double()
        .ok_or_else(|| RuntimeError::argument_mismatch(format!("expected double, found {}", v.type_name())))
}

/// `None` for `null`
fn str_arg(args: &[Value], i: usize) -> RuntimeResult<Option<&str>> {
    match arg(args, i)? {
        Value::Null => Ok(None),
        v => v
            .as_str()
            .map(Some)
            .ok_or_else(|| RuntimeError::argument_mismatch(format!("expected String, found {}", v.type_name()))),
    }
}

fn non_null_str(args: &[Value], i: usize) -> RuntimeResult<&str> {
    str_arg(args, i)?.ok_or_else(RuntimeError::null_pointer)
}

fn object_arg(args: &[Value], i: usize) -> RuntimeResult<ObjectRef> {
    match arg(args, i)? {
        Value::Ref(r) => Ok(r.clone()),
        Value::Null => Err(RuntimeError::null_pointer()),
        v => Err(RuntimeError::argument_mismatch(format!("expected object, found {}", v.type_name()))),
    }
}

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn identity_hash(object: &ObjectRef) -> i32 {
    ((Arc::as_ptr(object) as *const u8 as usize) >> 3) as i32
}

fn string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}

fn compare_strings(a: &str, b: &str) -> i32 {
    let (a, b) = (utf16(a), utf16(b));
    for (x, y) in a.iter().zip(b.iter()) {
        if x != y {
            return *x as i32 - *y as i32;
        }
    }
    a.len() as i32 - b.len() as i32
}

fn string_index_error(message: String) -> RuntimeError {
    RuntimeError::exception("java.lang.StringIndexOutOfBoundsException", message)
}

fn substring(s: &str, begin: i32, end: Option<i32>) -> RuntimeResult<Value> {
    let units = utf16(s);
    let end = end.unwrap_or(units.len() as i32);
    if begin < 0 || end > units.len() as i32 || begin > end {
        return Err(string_index_error(format!("begin {}, end {}, length {}", begin, end, units.len())));
    }
    Ok(Value::string(String::from_utf16_lossy(&units[begin as usize..end as usize])))
}

fn index_of(haystack: &str, needle: &str) -> i32 {
    match haystack.find(needle) {
        Some(byte) => haystack[..byte].encode_utf16().count() as i32,
        None => -1,
    }
}

fn map_char(c: i32, f: impl Fn(char) -> Option<char>) -> Value {
    let mapped = char::from_u32(c as u32)
        .and_then(f)
        .filter(|m| (*m as u32) <= 0xFFFF)
        .map(|m| m as i32)
        .unwrap_or(c);
    Value::Int(mapped)
}

fn test_char(c: i32, f: impl Fn(char) -> bool) -> Value {
    Value::Boolean(char::from_u32(c as u32).map(f).unwrap_or(false))
}

fn number_format(input: &str) -> RuntimeError {
    RuntimeError::exception("java.lang.NumberFormatException", format!("For input string: \"{}\"", input))
}

fn parse_int(s: Option<&str>, radix: u32) -> RuntimeResult<i32> {
    let s = s.ok_or_else(|| RuntimeError::exception("java.lang.NumberFormatException", "Cannot parse null string: null"))?;
    i32::from_str_radix(s, radix).map_err(|_| number_format(s))
}

fn parse_double(s: Option<&str>) -> RuntimeResult<f64> {
    let s = s.ok_or_else(RuntimeError::null_pointer)?;
    let trimmed = s.trim_matches(|c: char| c <= ' ');
    let body = trimmed.strip_suffix(['d', 'D', 'f', 'F']).unwrap_or(trimmed);
    match body {
        "NaN" | "+NaN" | "-NaN" => Ok(f64::NAN),
        "Infinity" | "+Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        _ if body.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => Err(number_format(s)),
        _ => body.parse::<f64>().map_err(|_| number_format(s)),
    }
}

fn java_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() { b } else { a }
    } else {
        a.max(b)
    }
}

fn java_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn java_round(x: f64) -> i64 {
    if x.is_nan() {
        0
    } else {
        (x + 0.5).floor() as i64
    }
}

fn write_stream(args: &[Value], text: &str, newline: bool) -> RuntimeResult<Value> {
    let stream = object_arg(args, 0)?;
    let fd = stream.get_field(PRINT_STREAM, "fd")?.as_int().unwrap_or(1);
    // PrintStream never reports I/O failures to the caller
    if fd == 2 {
        let mut err = std::io::stderr().lock();
        let _ = if newline { writeln!(err, "{}", text) } else { write!(err, "{}", text) };
    } else {
        let mut out = std::io::stdout().lock();
        let _ = if newline { writeln!(out, "{}", text) } else { write!(out, "{}", text) };
        let _ = out.flush();
    }
    Ok(Value::Void)
}

fn print_stream() -> HostClass {
    let mut class = HostClass::class(PRINT_STREAM).field("fd", Descriptor::int());
    for (name, newline) in [("println", true), ("print", false)] {
        if newline {
            class = class.method(name, "()V", move |_, args| write_stream(args, "", true));
        }
        class = class
            .method(name, "(Ljava/lang/String;)V", move |_, args| {
                let text = str_arg(args, 1)?.unwrap_or("null").to_string();
                write_stream(args, &text, newline)
            })
            .method(name, "(Ljava/lang/Object;)V", move |interp, args| {
                let text = interp.to_java_string(arg(args, 1)?)?;
                write_stream(args, &text, newline)
            })
            .method(name, "(I)V", move |_, args| write_stream(args, &int_arg(args, 1)?.to_string(), newline))
            .method(name, "(J)V", move |_, args| write_stream(args, &long_arg(args, 1)?.to_string(), newline))
            .method(name, "(F)V", move |_, args| write_stream(args, &format_float(float_arg(args, 1)?), newline))
            .method(name, "(D)V", move |_, args| write_stream(args, &format_double(double_arg(args, 1)?), newline))
            .method(name, "(Z)V", move |_, args| write_stream(args, &(int_arg(args, 1)? != 0).to_string(), newline))
            .method(name, "(C)V", move |_, args| write_stream(args, &format_char(int_arg(args, 1)? as u16), newline));
    }
    class
}

fn object_class() -> HostClass {
    HostClass::class(OBJECT)
        .constructor("()V", |_, _| Ok(Value::Void))
        .method("toString", "()Ljava/lang/String;", |_, args| {
            let this = object_arg(args, 0)?;
            Ok(Value::string(format!("{}@{:x}", this.class_name(), identity_hash(&this))))
        })
        .method("hashCode", "()I", |_, args| Ok(Value::Int(identity_hash(&object_arg(args, 0)?))))
        .method("equals", "(Ljava/lang/Object;)Z", |_, args| {
            let this = object_arg(args, 0)?;
            Ok(Value::Boolean(matches!(arg(args, 1)?, Value::Ref(other) if Arc::ptr_eq(&this, other))))
        })
}

fn string_class() -> HostClass {
    HostClass::class("java.lang.String")
        .implements("java.lang.CharSequence")
        .implements("java.lang.Comparable")
        .implements("java.io.Serializable")
        .constructor("()V", |_, _| {
            Err(RuntimeError::exception("java.lang.UnsupportedOperationException", "new String()"))
        })
        .method("length", "()I", |_, args| Ok(Value::Int(non_null_str(args, 0)?.encode_utf16().count() as i32)))
        .method("isEmpty", "()Z", |_, args| Ok(Value::Boolean(non_null_str(args, 0)?.is_empty())))
        .method("charAt", "(I)C", |_, args| {
            let units = utf16(non_null_str(args, 0)?);
            let index = int_arg(args, 1)?;
            match units.get(index as usize).filter(|_| index >= 0) {
                Some(c) => Ok(Value::Char(*c)),
                None => Err(string_index_error(format!("Index {} out of bounds for length {}", index, units.len()))),
            }
        })
        .method("substring", "(I)Ljava/lang/String;", |_, args| substring(non_null_str(args, 0)?, int_arg(args, 1)?, None))
        .method("substring", "(II)Ljava/lang/String;", |_, args| {
            substring(non_null_str(args, 0)?, int_arg(args, 1)?, Some(int_arg(args, 2)?))
        })
        .method("indexOf", "(Ljava/lang/String;)I", |_, args| {
            Ok(Value::Int(index_of(non_null_str(args, 0)?, non_null_str(args, 1)?)))
        })
        .method("indexOf", "(I)I", |_, args| {
            let c = int_arg(args, 1)?;
            let position = utf16(non_null_str(args, 0)?).iter().position(|u| *u as i32 == c);
            Ok(Value::Int(position.map(|p| p as i32).unwrap_or(-1)))
        })
        .method("contains", "(Ljava/lang/CharSequence;)Z", |interp, args| {
            let needle = interp.to_java_string(&Value::Ref(object_arg(args, 1)?))?;
            Ok(Value::Boolean(non_null_str(args, 0)?.contains(needle.as_str())))
        })
        .method("startsWith", "(Ljava/lang/String;)Z", |_, args| {
            Ok(Value::Boolean(non_null_str(args, 0)?.starts_with(non_null_str(args, 1)?)))
        })
        .method("endsWith", "(Ljava/lang/String;)Z", |_, args| {
            Ok(Value::Boolean(non_null_str(args, 0)?.ends_with(non_null_str(args, 1)?)))
        })
        .method("equals", "(Ljava/lang/Object;)Z", |_, args| {
            Ok(Value::Boolean(Some(non_null_str(args, 0)?) == arg(args, 1)?.as_str()))
        })
        .method("equalsIgnoreCase", "(Ljava/lang/String;)Z", |_, args| {
            let this = non_null_str(args, 0)?;
            Ok(Value::Boolean(str_arg(args, 1)?.map_or(false, |other| this.to_lowercase() == other.to_lowercase())))
        })
        .method("hashCode", "()I", |_, args| Ok(Value::Int(string_hash(non_null_str(args, 0)?))))
        .method("compareTo", "(Ljava/lang/String;)I", |_, args| {
            Ok(Value::Int(compare_strings(non_null_str(args, 0)?, non_null_str(args, 1)?)))
        })
        .method("compareTo", "(Ljava/lang/Object;)I", |_, args| {
            let other = non_null_str(args, 1).map_err(|_| RuntimeError::class_cast("java.lang.Object", "java.lang.String"))?;
            Ok(Value::Int(compare_strings(non_null_str(args, 0)?, other)))
        })
        .method("concat", "(Ljava/lang/String;)Ljava/lang/String;", |_, args| {
            Ok(Value::string(format!("{}{}", non_null_str(args, 0)?, non_null_str(args, 1)?)))
        })
        .method("toUpperCase", "()Ljava/lang/String;", |_, args| Ok(Value::string(non_null_str(args, 0)?.to_uppercase())))
        .method("toLowerCase", "()Ljava/lang/String;", |_, args| Ok(Value::string(non_null_str(args, 0)?.to_lowercase())))
        .method("trim", "()Ljava/lang/String;", |_, args| {
            Ok(Value::string(non_null_str(args, 0)?.trim_matches(|c: char| c <= ' ')))
        })
        .method("toString", "()Ljava/lang/String;", |_, args| Ok(arg(args, 0)?.clone()))
        .static_method("valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", |interp, args| {
            Ok(Value::string(interp.to_java_string(arg(args, 0)?)?))
        })
        .static_method("valueOf", "(I)Ljava/lang/String;", |_, args| Ok(Value::string(int_arg(args, 0)?.to_string())))
        .static_method("valueOf", "(J)Ljava/lang/String;", |_, args| Ok(Value::string(long_arg(args, 0)?.to_string())))
        .static_method("valueOf", "(F)Ljava/lang/String;", |_, args| Ok(Value::string(format_float(float_arg(args, 0)?))))
        .static_method("valueOf", "(D)Ljava/lang/String;", |_, args| Ok(Value::string(format_double(double_arg(args, 0)?))))
        .static_method("valueOf", "(Z)Ljava/lang/String;", |_, args| Ok(Value::string((int_arg(args, 0)? != 0).to_string())))
        .static_method("valueOf", "(C)Ljava/lang/String;", |_, args| Ok(Value::string(format_char(int_arg(args, 0)? as u16))))
}

fn math_class() -> HostClass {
    let mut class = HostClass::class("java.lang.Math")
        .static_field("PI", Descriptor::double(), Value::Double(std::f64::consts::PI))
        .static_field("E", Descriptor::double(), Value::Double(std::f64::consts::E))
        .static_method("abs", "(I)I", |_, args| Ok(Value::Int(int_arg(args, 0)?.wrapping_abs())))
        .static_method("abs", "(J)J", |_, args| Ok(Value::Long(long_arg(args, 0)?.wrapping_abs())))
        .static_method("abs", "(F)F", |_, args| Ok(Value::Float(float_arg(args, 0)?.abs())))
        .static_method("abs", "(D)D", |_, args| Ok(Value::Double(double_arg(args, 0)?.abs())))
        .static_method("max", "(II)I", |_, args| Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?))))
        .static_method("min", "(II)I", |_, args| Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?))))
        .static_method("max", "(JJ)J", |_, args| Ok(Value::Long(long_arg(args, 0)?.max(long_arg(args, 1)?))))
        .static_method("min", "(JJ)J", |_, args| Ok(Value::Long(long_arg(args, 0)?.min(long_arg(args, 1)?))))
        .static_method("max", "(FF)F", |_, args| {
            Ok(Value::Float(java_max(float_arg(args, 0)? as f64, float_arg(args, 1)? as f64) as f32))
        })
        .static_method("min", "(FF)F", |_, args| {
            Ok(Value::Float(java_min(float_arg(args, 0)? as f64, float_arg(args, 1)? as f64) as f32))
        })
        .static_method("max", "(DD)D", |_, args| Ok(Value::Double(java_max(double_arg(args, 0)?, double_arg(args, 1)?))))
        .static_method("min", "(DD)D", |_, args| Ok(Value::Double(java_min(double_arg(args, 0)?, double_arg(args, 1)?))))
        .static_method("pow", "(DD)D", |_, args| Ok(Value::Double(double_arg(args, 0)?.powf(double_arg(args, 1)?))))
        .static_method("round", "(D)J", |_, args| Ok(Value::Long(java_round(double_arg(args, 0)?))))
        .static_method("round", "(F)I", |_, args| Ok(Value::Int(java_round(float_arg(args, 0)? as f64) as i32)));
    let unary: [(&str, fn(f64) -> f64); 11] = [
        ("sqrt", f64::sqrt),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("cbrt", f64::cbrt),
        ("signum", |x: f64| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
    ];
    for (name, f) in unary {
        class = class.static_method(name, "(D)D", move |_, args| Ok(Value::Double(f(double_arg(args, 0)?))));
    }
    class
}

fn integer_class() -> HostClass {
    HostClass::class("java.lang.Integer")
        .static_field("MAX_VALUE", Descriptor::int(), Value::Int(i32::MAX))
        .static_field("MIN_VALUE", Descriptor::int(), Value::Int(i32::MIN))
        .static_method("parseInt", "(Ljava/lang/String;)I", |_, args| Ok(Value::Int(parse_int(str_arg(args, 0)?, 10)?)))
        .static_method("parseInt", "(Ljava/lang/String;I)I", |_, args| {
            let radix = int_arg(args, 1)?;
            if !(2..=36).contains(&radix) {
                return Err(RuntimeError::exception("java.lang.NumberFormatException", format!("radix {} out of range", radix)));
            }
            Ok(Value::Int(parse_int(str_arg(args, 0)?, radix as u32)?))
        })
        .static_method("toString", "(I)Ljava/lang/String;", |_, args| Ok(Value::string(int_arg(args, 0)?.to_string())))
        .static_method("toHexString", "(I)Ljava/lang/String;", |_, args| Ok(Value::string(format!("{:x}", int_arg(args, 0)? as u32))))
        .static_method("toBinaryString", "(I)Ljava/lang/String;", |_, args| Ok(Value::string(format!("{:b}", int_arg(args, 0)? as u32))))
        .static_method("toOctalString", "(I)Ljava/lang/String;", |_, args| Ok(Value::string(format!("{:o}", int_arg(args, 0)? as u32))))
        .static_method("compare", "(II)I", |_, args| Ok(Value::Int(int_arg(args, 0)?.cmp(&int_arg(args, 1)?) as i32)))
        .static_method("signum", "(I)I", |_, args| Ok(Value::Int(int_arg(args, 0)?.signum())))
}

fn long_class() -> HostClass {
    HostClass::class("java.lang.Long")
        .static_field("MAX_VALUE", Descriptor::long(), Value::Long(i64::MAX))
        .static_field("MIN_VALUE", Descriptor::long(), Value::Long(i64::MIN))
        .static_method("parseLong", "(Ljava/lang/String;)J", |_, args| {
            let s = str_arg(args, 0)?
                .ok_or_else(|| RuntimeError::exception("java.lang.NumberFormatException", "Cannot parse null string: null"))?;
            s.parse::<i64>().map(Value::Long).map_err(|_| number_format(s))
        })
        .static_method("toString", "(J)Ljava/lang/String;", |_, args| Ok(Value::string(long_arg(args, 0)?.to_string())))
        .static_method("compare", "(JJ)I", |_, args| Ok(Value::Int(long_arg(args, 0)?.cmp(&long_arg(args, 1)?) as i32)))
}

fn double_class() -> HostClass {
    HostClass::class("java.lang.Double")
        .static_field("MAX_VALUE", Descriptor::double(), Value::Double(f64::MAX))
        .static_field("MIN_VALUE", Descriptor::double(), Value::Double(f64::from_bits(1)))
        .static_field("POSITIVE_INFINITY", Descriptor::double(), Value::Double(f64::INFINITY))
        .static_field("NEGATIVE_INFINITY", Descriptor::double(), Value::Double(f64::NEG_INFINITY))
        .static_field("NaN", Descriptor::double(), Value::Double(f64::NAN))
        .static_method("parseDouble", "(Ljava/lang/String;)D", |_, args| Ok(Value::Double(parse_double(str_arg(args, 0)?)?)))
        .static_method("toString", "(D)Ljava/lang/String;", |_, args| Ok(Value::string(format_double(double_arg(args, 0)?))))
        .static_method("isNaN", "(D)Z", |_, args| Ok(Value::Boolean(double_arg(args, 0)?.is_nan())))
        .static_method("isInfinite", "(D)Z", |_, args| Ok(Value::Boolean(double_arg(args, 0)?.is_infinite())))
        .static_method("compare", "(DD)I", |_, args| {
            let (a, b) = (double_arg(args, 0)?, double_arg(args, 1)?);
            Ok(Value::Int(a.total_cmp(&b) as i32))
        })
}

fn float_class() -> HostClass {
    HostClass::class("java.lang.Float")
        .static_field("MAX_VALUE", Descriptor::known(crate::descriptor::FLOAT), Value::Float(f32::MAX))
        .static_field("MIN_VALUE", Descriptor::known(crate::descriptor::FLOAT), Value::Float(f32::from_bits(1)))
        .static_method("parseFloat", "(Ljava/lang/String;)F", |_, args| Ok(Value::Float(parse_double(str_arg(args, 0)?)? as f32)))
        .static_method("toString", "(F)Ljava/lang/String;", |_, args| Ok(Value::string(format_float(float_arg(args, 0)?))))
        .static_method("isNaN", "(F)Z", |_, args| Ok(Value::Boolean(float_arg(args, 0)?.is_nan())))
}

fn boolean_class() -> HostClass {
    HostClass::class("java.lang.Boolean")
        .static_method("parseBoolean", "(Ljava/lang/String;)Z", |_, args| {
            Ok(Value::Boolean(str_arg(args, 0)?.map_or(false, |s| s.eq_ignore_ascii_case("true"))))
        })
        .static_method("toString", "(Z)Ljava/lang/String;", |_, args| Ok(Value::string((int_arg(args, 0)? != 0).to_string())))
}

fn character_class() -> HostClass {
    HostClass::class("java.lang.Character")
        .static_field("MAX_VALUE", Descriptor::known(crate::descriptor::CHAR), Value::Char(u16::MAX))
        .static_field("MIN_VALUE", Descriptor::known(crate::descriptor::CHAR), Value::Char(0))
        .static_method("isDigit", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_numeric())))
        .static_method("isLetter", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_alphabetic())))
        .static_method("isLetterOrDigit", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_alphanumeric())))
        .static_method("isWhitespace", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_whitespace())))
        .static_method("isUpperCase", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_uppercase())))
        .static_method("isLowerCase", "(C)Z", |_, args| Ok(test_char(int_arg(args, 0)?, |c| c.is_lowercase())))
        .static_method("toUpperCase", "(C)C", |_, args| Ok(map_char(int_arg(args, 0)?, |c| c.to_uppercase().next())))
        .static_method("toLowerCase", "(C)C", |_, args| Ok(map_char(int_arg(args, 0)?, |c| c.to_lowercase().next())))
        .static_method("toString", "(C)Ljava/lang/String;", |_, args| Ok(Value::string(format_char(int_arg(args, 0)? as u16))))
}

fn system_class() -> HostClass {
    static START: OnceLock<Instant> = OnceLock::new();
    let stream = Descriptor::known("Ljava/io/PrintStream;");
    HostClass::class("java.lang.System")
        .static_field("out", stream.clone(), Value::Null)
        .static_field("err", stream, Value::Null)
        .static_method("currentTimeMillis", "()J", |_, _| {
            let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
            Ok(Value::Long(millis))
        })
        .static_method("nanoTime", "()J", |_, _| {
            Ok(Value::Long(START.get_or_init(Instant::now).elapsed().as_nanos() as i64))
        })
        .static_method("arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V", |_, args| {
            let (src, src_pos) = (object_arg(args, 0)?, int_arg(args, 1)?);
            let (dest, dest_pos) = (object_arg(args, 2)?, int_arg(args, 3)?);
            let length = int_arg(args, 4)?;
            let (Object::Array { component: src_type, elements: src_elements }, Object::Array { component: dest_type, elements: dest_elements }) =
                (src.as_ref(), dest.as_ref())
            else {
                return Err(RuntimeError::exception("java.lang.ArrayStoreException", "arraycopy: argument is not an array"));
            };
            if src_type != dest_type && (src_type.is_primitive() || dest_type.is_primitive()) {
                return Err(RuntimeError::exception("java.lang.ArrayStoreException", "arraycopy: type mismatch"));
            }
            let copied: Vec<Value> = {
                let elements = lock(src_elements);
                if src_pos < 0 || length < 0 || (src_pos as i64 + length as i64) > elements.len() as i64 {
                    return Err(RuntimeError::index_out_of_bounds(src_pos.saturating_add(length), elements.len()));
                }
                elements[src_pos as usize..(src_pos + length) as usize].to_vec()
            };
            let mut elements = lock(dest_elements);
            if dest_pos < 0 || (dest_pos as i64 + length as i64) > elements.len() as i64 {
                return Err(RuntimeError::index_out_of_bounds(dest_pos.saturating_add(length), elements.len()));
            }
            for (offset, value) in copied.into_iter().enumerate() {
                elements[dest_pos as usize + offset] = value;
            }
            Ok(Value::Void)
        })
}

/// Exception class with the `()` and `(String)` constructors
fn throwable(name: &str, super_name: &str) -> HostClass {
    HostClass::class(name)
        .extends(super_name)
        .constructor("()V", |_, _| Ok(Value::Void))
        .constructor("(Ljava/lang/String;)V", |_, args| {
            object_arg(args, 0)?.set_field(THROWABLE, "message", arg(args, 1)?.clone())?;
            Ok(Value::Void)
        })
}

fn throwable_classes() -> Vec<HostClass> {
    let root = throwable(THROWABLE, OBJECT)
        .implements("java.io.Serializable")
        .field("message", Descriptor::string())
        .method("getMessage", "()Ljava/lang/String;", |_, args| object_arg(args, 0)?.get_field(THROWABLE, "message"))
        .method("toString", "()Ljava/lang/String;", |_, args| {
            let this = object_arg(args, 0)?;
            let text = match this.get_field(THROWABLE, "message")? {
                Value::Null => this.class_name(),
                message => format!("{}: {}", this.class_name(), message),
            };
            Ok(Value::string(text))
        });
    let mut classes = vec![root];
    for (name, super_name) in [
        ("java.lang.Exception", THROWABLE),
        ("java.lang.Error", THROWABLE),
        ("java.lang.AssertionError", "java.lang.Error"),
        ("java.lang.RuntimeException", "java.lang.Exception"),
        ("java.lang.ArithmeticException", "java.lang.RuntimeException"),
        ("java.lang.NullPointerException", "java.lang.RuntimeException"),
        ("java.lang.ClassCastException", "java.lang.RuntimeException"),
        ("java.lang.NegativeArraySizeException", "java.lang.RuntimeException"),
        ("java.lang.ArrayStoreException", "java.lang.RuntimeException"),
        ("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
        ("java.lang.IllegalStateException", "java.lang.RuntimeException"),
        ("java.lang.UnsupportedOperationException", "java.lang.RuntimeException"),
        ("java.lang.NumberFormatException", "java.lang.IllegalArgumentException"),
        ("java.lang.IndexOutOfBoundsException", "java.lang.RuntimeException"),
        ("java.lang.ArrayIndexOutOfBoundsException", "java.lang.IndexOutOfBoundsException"),
        ("java.lang.StringIndexOutOfBoundsException", "java.lang.IndexOutOfBoundsException"),
    ] {
        classes.push(throwable(name, super_name));
    }
    classes
}

fn system_classes() -> Vec<HostClass> {
    let mut classes = vec![
        object_class(),
        HostClass::interface("java.lang.CharSequence")
            .abstract_method("length", "()I")
            .abstract_method("charAt", "(I)C"),
        HostClass::interface("java.lang.Comparable").abstract_method("compareTo", "(Ljava/lang/Object;)I"),
        HostClass::interface("java.lang.Runnable").abstract_method("run", "()V"),
        HostClass::interface("java.lang.Cloneable"),
        HostClass::interface("java.io.Serializable"),
        string_class(),
        math_class(),
        integer_class(),
        long_class(),
        double_class(),
        float_class(),
        boolean_class(),
        character_class(),
        system_class(),
        print_stream(),
    ];
    classes.extend(throwable_classes());
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_static(class: &str, name: &str, descriptor: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let runtime = HostRuntime::system();
        let class = runtime.load_class(class)?;
        Interpreter::new(runtime, 64).invoke_static(&class, name, descriptor, args)
    }

    #[test]
    fn test_system_classes_are_registered() {
        let runtime = HostRuntime::system();
        for name in ["java.lang.Object", "java.lang.String", "java.lang.Math", "java.lang.ArithmeticException"] {
            assert!(runtime.find_class(name).unwrap().is_some(), "{}", name);
        }
        let string = runtime.load_class("java.lang.String").unwrap();
        assert_eq!(string.super_name.as_deref(), Some("java.lang.Object"));
        assert!(string.interfaces.contains(&"java.lang.CharSequence".to_string()));
    }

    #[test]
    fn test_string_natives_use_utf16_indices() {
        let s = Value::string("h\u{e9}llo");
        let runtime = HostRuntime::system();
        let mut interp = Interpreter::new(runtime, 64);
        let receiver = s.as_object().unwrap().clone();
        let length = interp.invoke_virtual(&receiver, "length", "()I", vec![]).unwrap();
        assert_eq!(length, Value::Int(5));
        let sub = interp
            .invoke_virtual(&receiver, "substring", "(II)Ljava/lang/String;", vec![Value::Int(1), Value::Int(3)])
            .unwrap();
        assert_eq!(sub.as_str(), Some("\u{e9}l"));
        let err = interp.invoke_virtual(&receiver, "charAt", "(I)C", vec![Value::Int(9)]).unwrap_err();
        assert_eq!(err.exception_class(), Some("java.lang.StringIndexOutOfBoundsException"));
    }

    #[test]
    fn test_string_hash_matches_java() {
        assert_eq!(string_hash("hello"), 99162322);
        assert_eq!(compare_strings("apple", "banana"), -1);
        assert_eq!(compare_strings("ab", "abc"), -1);
    }

    #[test]
    fn test_value_of_formats_like_java() {
        let v = call_static("java.lang.String", "valueOf", "(D)Ljava/lang/String;", vec![Value::Double(100.0)]).unwrap();
        assert_eq!(v.as_str(), Some("100.0"));
        let v = call_static("java.lang.String", "valueOf", "(C)Ljava/lang/String;", vec![Value::Int(65)]).unwrap();
        assert_eq!(v.as_str(), Some("A"));
        let v = call_static("java.lang.String", "valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", vec![Value::Null]).unwrap();
        assert_eq!(v.as_str(), Some("null"));
    }

    #[test]
    fn test_parse_int_errors() {
        let err = call_static("java.lang.Integer", "parseInt", "(Ljava/lang/String;)I", vec![Value::string("12x")]).unwrap_err();
        assert_eq!(err.to_string(), "java.lang.NumberFormatException: For input string: \"12x\"");
        let ok = call_static("java.lang.Integer", "parseInt", "(Ljava/lang/String;)I", vec![Value::string("-42")]).unwrap();
        assert_eq!(ok, Value::Int(-42));
    }

    #[test]
    fn test_math_edge_cases() {
        assert!(java_max(f64::NAN, 1.0).is_nan());
        assert_eq!(java_max(-0.0, 0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(java_round(2.5), 3);
        assert_eq!(java_round(-2.5), -2);
        let v = call_static("java.lang.Math", "sqrt", "(D)D", vec![Value::Double(16.0)]).unwrap();
        assert_eq!(v, Value::Double(4.0));
    }

    #[test]
    fn test_exception_message_round_trip() {
        let runtime = HostRuntime::system();
        let class = runtime.load_class("java.lang.IllegalStateException").unwrap();
        let mut interp = Interpreter::new(runtime, 64);
        let object = interp.construct(&class, "(Ljava/lang/String;)V", vec![Value::string("boom")]).unwrap();
        let text = interp.to_java_string(&Value::Ref(object)).unwrap();
        assert_eq!(text, "java.lang.IllegalStateException: boom");
    }

    #[test]
    fn test_custom_host_class() {
        let runtime = HostRuntime::builder()
            .with_class(HostClass::interface("demo.Adder").abstract_method("add", "(II)I"))
            .build();
        let adder = runtime.load_class("demo.Adder").unwrap();
        assert!(adder.is_interface());
        assert!(runtime.find_class("java.lang.String").unwrap().is_some());
    }
}

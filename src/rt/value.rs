//! Runtime values and heap objects

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::class::RuntimeClass;
use super::error::{RuntimeError, RuntimeResult};
use crate::descriptor::{self, Descriptor};

pub type ObjectRef = Arc<Object>;

/// Heap object
pub enum Object {
    /// Instance of a loaded or host class; fields keyed by `(declaring class, name)`
    Instance {
        class: Arc<RuntimeClass>,
        fields: Mutex<HashMap<(String, String), Value>>,
    },
    Str(String),
    Array {
        component: Descriptor,
        elements: Mutex<Vec<Value>>,
    },
}

/// Lock a mutex, recovering the data if another thread panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Object {
    pub fn new_array(component: Descriptor, length: usize) -> Self {
        let default = Value::default_for(&component);
        Object::Array { component, elements: Mutex::new(vec![default; length]) }
    }

    /// Reflective class name, `[I` style for arrays
    pub fn class_name(&self) -> String {
        match self {
            Object::Instance { class, .. } => class.name.clone(),
            Object::Str(_) => "java.lang.String".to_string(),
            Object::Array { component, .. } => component.array_of().class_name(),
        }
    }

    pub fn runtime_class(&self) -> Option<&Arc<RuntimeClass>> {
        match self {
            Object::Instance { class, .. } => Some(class),
            _ => None,
        }
    }

    pub fn get_field(&self, owner: &str, name: &str) -> RuntimeResult<Value> {
        match self {
            Object::Instance { fields, .. } => lock(fields)
                .get(&(owner.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| RuntimeError::no_such_field(owner, name)),
            _ => Err(RuntimeError::no_such_field(self.class_name(), name)),
        }
    }

    pub fn set_field(&self, owner: &str, name: &str, value: Value) -> RuntimeResult<()> {
        match self {
            Object::Instance { fields, .. } => {
                lock(fields).insert((owner.to_string(), name.to_string()), value);
                Ok(())
            }
            _ => Err(RuntimeError::no_such_field(self.class_name(), name)),
        }
    }

    pub fn array_length(&self) -> Option<usize> {
        match self {
            Object::Array { elements, .. } => Some(lock(elements).len()),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Instance { class, .. } => write!(f, "Instance({})", class.name),
            Object::Str(s) => write!(f, "Str({:?})", s),
            Object::Array { component, elements } => {
                write!(f, "Array({}[{}])", component, lock(elements).len())
            }
        }
    }
}

/// A Java value
///
/// Inside the interpreter `boolean`, `byte`, `char` and `short` are widened to
/// [`Value::Int`], as on the JVM operand stack; [`Value::from_stack`] narrows
/// them back at API boundaries.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(ObjectRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Void, Void) | (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Ref(a), Ref(b)) => match (a.as_ref(), b.as_ref()) {
                (Object::Str(x), Object::Str(y)) => x == y,
                _ => Arc::ptr_eq(a, b),
            },
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Ref(Arc::new(Object::Str(s.into())))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `long` and `double` take two stack slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Short(v) => Some(*v as i32),
            Value::Byte(v) => Some(*v as i32),
            Value::Char(v) => Some(*v as i32),
            Value::Boolean(v) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            other => other.as_int().map(i64::from),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            other => other.as_int().map(f64::from),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ref(obj) => match obj.as_ref() {
                Object::Str(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// Widen sub-int primitives to `Int`
    pub fn to_stack(self) -> Value {
        match self {
            Value::Boolean(b) => Value::Int(b as i32),
            Value::Byte(v) => Value::Int(v as i32),
            Value::Char(v) => Value::Int(v as i32),
            Value::Short(v) => Value::Int(v as i32),
            other => other,
        }
    }

    /// Narrow an operand-stack value to the declared type
    pub fn from_stack(self, d: &Descriptor) -> Value {
        match (self, d.as_str()) {
            (Value::Int(v), descriptor::BOOLEAN) => Value::Boolean(v != 0),
            (Value::Int(v), descriptor::BYTE) => Value::Byte(v as i8),
            (Value::Int(v), descriptor::CHAR) => Value::Char(v as u16),
            (Value::Int(v), descriptor::SHORT) => Value::Short(v as i16),
            (other, _) => other,
        }
    }

    /// Initial value of a field or array element, in stack form
    pub fn default_for(d: &Descriptor) -> Value {
        match d.as_str() {
            descriptor::VOID => Value::Void,
            descriptor::LONG => Value::Long(0),
            descriptor::FLOAT => Value::Float(0.0),
            descriptor::DOUBLE => Value::Double(0.0),
            descriptor::BOOLEAN
            | descriptor::BYTE
            | descriptor::CHAR
            | descriptor::SHORT
            | descriptor::INT => Value::Int(0),
            _ => Value::Null,
        }
    }

    /// Convert a caller-supplied argument to the stack form of `d`,
    /// applying widening primitive conversion only
    pub fn coerce_to(self, d: &Descriptor) -> RuntimeResult<Value> {
        let mismatch = |v: &Value| {
            RuntimeError::argument_mismatch(format!("cannot pass {} as {}", v.type_name(), d))
        };
        let converted = match d.as_str() {
            descriptor::BOOLEAN => match self {
                Value::Boolean(b) => Some(Value::Int(b as i32)),
                _ => None,
            },
            descriptor::CHAR => match self {
                Value::Char(c) => Some(Value::Int(c as i32)),
                _ => None,
            },
            descriptor::BYTE => match self {
                Value::Byte(v) => Some(Value::Int(v as i32)),
                _ => None,
            },
            descriptor::SHORT => match self {
                Value::Byte(_) | Value::Short(_) => self.as_int().map(Value::Int),
                _ => None,
            },
            descriptor::INT => match self {
                Value::Boolean(_) => None,
                _ => self.as_int().map(Value::Int),
            },
            descriptor::LONG => match self {
                Value::Boolean(_) => None,
                _ => self.as_long().map(Value::Long),
            },
            descriptor::FLOAT => match self {
                Value::Float(v) => Some(Value::Float(v)),
                Value::Long(v) => Some(Value::Float(v as f32)),
                Value::Boolean(_) => None,
                _ => self.as_int().map(|v| Value::Float(v as f32)),
            },
            descriptor::DOUBLE => match self {
                Value::Boolean(_) => None,
                _ => self.as_double().map(Value::Double),
            },
            _ => match self {
                Value::Null | Value::Ref(_) => Some(self.clone()),
                _ => None,
            },
        };
        converted.ok_or_else(|| mismatch(&self))
    }

    /// Java name of the value's type, for messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Void => "void".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Byte(_) => "byte".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Short(_) => "short".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Null => "null".to_string(),
            Value::Ref(obj) => obj.class_name(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        let mut buf = [0u16; 2];
        Value::Char(v.encode_utf16(&mut buf)[0])
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::string(v)
    }
}

/// `Double.toString`
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = d.abs();
    if d == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = format!("{}", d);
        if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        }
    } else {
        scientific(format!("{:e}", d))
    }
}

/// `Float.toString`
pub fn format_float(f: f32) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = f.abs();
    if f == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = format!("{}", f);
        if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        }
    } else {
        scientific(format!("{:e}", f))
    }
}

/// `1.5e-5` to `1.5E-5`, `1e10` to `1.0E10`
fn scientific(rust: String) -> String {
    match rust.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => rust,
    }
}

pub fn format_char(c: u16) -> String {
    char::decode_utf16([c])
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(c) => f.write_str(&format_char(*c)),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::Double(v) => f.write_str(&format_double(*v)),
            Value::Null => f.write_str("null"),
            Value::Ref(obj) => match obj.as_ref() {
                Object::Str(s) => f.write_str(s),
                other => write!(f, "{}@{:x}", other.class_name(), Arc::as_ptr(obj) as *const u8 as usize),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_formatting() {
        assert_eq!(format_double(7.95), "7.95");
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(100.0), "100.0");
        assert_eq!(format_double(-0.0), "-0.0");
        assert_eq!(format_double(1e10), "1.0E10");
        assert_eq!(format_double(1.5e-5), "1.5E-5");
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_float(2.5), "2.5");
    }

    #[test]
    fn test_stack_form() {
        let c = Value::Char(b'a' as u16).to_stack();
        assert_eq!(c, Value::Int(97));
        assert_eq!(c.from_stack(&Descriptor::new("C").unwrap()), Value::Char(97));
        assert_eq!(Value::Int(1).from_stack(&Descriptor::boolean()), Value::Boolean(true));
    }

    #[test]
    fn test_coercion_widens_only() {
        assert_eq!(Value::Int(3).coerce_to(&Descriptor::double()).unwrap(), Value::Double(3.0));
        assert_eq!(Value::Boolean(true).coerce_to(&Descriptor::boolean()).unwrap(), Value::Int(1));
        assert!(Value::Double(3.0).coerce_to(&Descriptor::int()).is_err());
        assert!(Value::Int(3).coerce_to(&Descriptor::object()).is_err());
        assert!(Value::Null.coerce_to(&Descriptor::string()).is_ok());
    }

    #[test]
    fn test_string_equality_is_by_content() {
        assert_eq!(Value::string("abc"), Value::from("abc"));
        assert_ne!(Value::string("abc"), Value::Null);
        assert_eq!(Value::string("x").to_string(), "x");
    }
}

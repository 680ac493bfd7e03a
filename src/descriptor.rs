//! Field and method descriptors
//!
//! Three notations name a type:
//!
//! - the *class name* as used reflectively: `int`, `java.lang.String`,
//!   `[Ljava.lang.String;`
//! - the *internal form* used in class-file constant pools: `java/lang/String`
//! - the *descriptor*: `I`, `Ljava/lang/String;`, `[I`, `(ID)V`
//!
//! The free functions convert between them and classify descriptors. They
//! operate on `&str` so the class-file reader and writer can use them without
//! allocating a [`Descriptor`]; everything above the class-file layer passes
//! the validated [`Descriptor`] newtype around instead.

use std::fmt;

use crate::error::{Error, Result};

pub const VOID: &str = "V";
pub const BYTE: &str = "B";
pub const CHAR: &str = "C";
pub const DOUBLE: &str = "D";
pub const FLOAT: &str = "F";
pub const INT: &str = "I";
pub const LONG: &str = "J";
pub const SHORT: &str = "S";
pub const BOOLEAN: &str = "Z";
pub const OBJECT: &str = "Ljava/lang/Object;";
pub const STRING: &str = "Ljava/lang/String;";
pub const CLASS: &str = "Ljava/lang/Class;";
pub const THROWABLE: &str = "Ljava/lang/Throwable;";
pub const RUNTIME_EXCEPTION: &str = "Ljava/lang/RuntimeException;";
pub const ERROR: &str = "Ljava/lang/Error;";
pub const CLONEABLE: &str = "Ljava/lang/Cloneable;";
pub const SERIALIZABLE: &str = "Ljava/io/Serializable;";

const PRIMITIVES: [(&str, &str); 9] = [
    (VOID, "void"),
    (BYTE, "byte"),
    (CHAR, "char"),
    (DOUBLE, "double"),
    (FLOAT, "float"),
    (INT, "int"),
    (LONG, "long"),
    (SHORT, "short"),
    (BOOLEAN, "boolean"),
];

pub fn is_array(d: &str) -> bool {
    d.starts_with('[')
}

pub fn is_class_reference(d: &str) -> bool {
    d.starts_with('L')
}

pub fn is_primitive(d: &str) -> bool {
    d.len() == 1 && "VBCDFIJSZ".contains(d)
}

pub fn is_reference(d: &str) -> bool {
    is_array(d) || is_class_reference(d)
}

/// `true` for the seven numeric primitives, `boolean` and `void` excluded
pub fn is_primitive_numeric(d: &str) -> bool {
    d.len() == 1 && "BCDFIJS".contains(d)
}

/// Number of operand stack / local variable slots a value of this type takes
pub fn size(d: &str) -> Result<u8> {
    match d {
        VOID => Ok(0),
        BYTE | CHAR | INT | SHORT | BOOLEAN | FLOAT => Ok(1),
        LONG | DOUBLE => Ok(2),
        _ if is_reference(d) => check_field_type(d, false).map(|_| 1),
        _ => Err(Error::invalid_descriptor(d, "no size defined for this type")),
    }
}

pub fn component_descriptor(d: &str) -> Result<String> {
    match d.strip_prefix('[') {
        Some(component) => Ok(component.to_string()),
        None => Err(Error::invalid_descriptor(
            d,
            "cannot determine component descriptor from non-array descriptor",
        )),
    }
}

fn primitive_name(d: &str) -> Option<&'static str> {
    PRIMITIVES.iter().find(|(p, _)| *p == d).map(|(_, name)| *name)
}

fn primitive_descriptor(name: &str) -> Option<&'static str> {
    PRIMITIVES.iter().find(|(_, n)| *n == name).map(|(p, _)| *p)
}

/// Parse one field type starting at `start`, returning the index just past it
fn scan_field_type(d: &str, start: usize, allow_void: bool) -> Result<usize> {
    let bytes = d.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
    }
    let dims = i - start;
    match bytes.get(i) {
        None => Err(Error::invalid_descriptor(d, "unexpected end of descriptor")),
        Some(b'V') if allow_void && dims == 0 => Ok(i + 1),
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(i + 1),
        Some(b'L') => match d[i + 1..].find(';') {
            Some(0) => Err(Error::invalid_descriptor(d, "empty class name")),
            Some(end) => Ok(i + 1 + end + 1),
            None => Err(Error::invalid_descriptor(d, "unterminated class reference")),
        },
        Some(other) => Err(Error::invalid_descriptor(
            d,
            format!("unknown type letter '{}'", *other as char),
        )),
    }
}

/// `d` must be exactly one field type
fn check_field_type(d: &str, allow_void: bool) -> Result<()> {
    let end = scan_field_type(d, 0, allow_void)?;
    if end != d.len() {
        return Err(Error::invalid_descriptor(d, "trailing characters after field descriptor"));
    }
    Ok(())
}

fn display_field_type(d: &str) -> Result<String> {
    let dims = d.bytes().take_while(|b| *b == b'[').count();
    let element = &d[dims..];
    let mut out = if let Some(name) = primitive_name(element) {
        name.to_string()
    } else if let Some(internal) = element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        internal.replace('/', ".")
    } else {
        return Err(Error::invalid_descriptor(d, "not a field descriptor"));
    };
    for _ in 0..dims {
        out.push_str("[]");
    }
    Ok(out)
}

/// Human readable rendering: `[I` is `int[]`, `(ID)V` is `(int, double) => void`
pub fn to_display_string(d: &str) -> Result<String> {
    if let Some(rest) = d.strip_prefix('(') {
        if !rest.contains(')') {
            return Err(Error::invalid_descriptor(d, "missing ')' in method descriptor"));
        }
        let (params, ret) = parse_method_descriptor(d)?;
        let params = params
            .iter()
            .map(|p| display_field_type(p.as_str()))
            .collect::<Result<Vec<_>>>()?;
        return Ok(format!("({}) => {}", params.join(", "), display_field_type(ret.as_str())?));
    }
    check_field_type(d, true)?;
    display_field_type(d)
}

/// `int` to `I`, `java.lang.String` to `Ljava/lang/String;`, `[Ljava.lang.String;` to `[Ljava/lang/String;`
pub fn from_class_name(class_name: &str) -> Result<String> {
    if class_name.is_empty() {
        return Err(Error::invalid_descriptor(class_name, "empty class name"));
    }
    if let Some(p) = primitive_descriptor(class_name) {
        return Ok(p.to_string());
    }
    if class_name.starts_with('[') {
        let d = class_name.replace('.', "/");
        check_field_type(&d, false)?;
        return Ok(d);
    }
    Ok(format!("L{};", class_name.replace('.', "/")))
}

/// Inverse of [`from_class_name`]
pub fn to_class_name(d: &str) -> Result<String> {
    if let Some(name) = primitive_name(d) {
        return Ok(name.to_string());
    }
    check_field_type(d, false)?;
    if is_array(d) {
        return Ok(d.replace('/', "."));
    }
    match d.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(internal) => Ok(internal.replace('/', ".")),
        None => Err(Error::invalid_descriptor(d, "cannot convert descriptor to class name")),
    }
}

/// `java/lang/String` to `Ljava/lang/String;`; array descriptors pass through
pub fn from_internal_form(internal: &str) -> Result<String> {
    if internal.is_empty() {
        return Err(Error::invalid_descriptor(internal, "empty internal name"));
    }
    if internal.starts_with('[') {
        return Ok(internal.to_string());
    }
    Ok(format!("L{};", internal))
}

/// `Ljava/lang/String;` to `java/lang/String`; array descriptors pass through
pub fn to_internal_form(d: &str) -> Result<String> {
    if is_array(d) {
        return Ok(d.to_string());
    }
    match d.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(internal) if !internal.is_empty() => Ok(internal.to_string()),
        _ => Err(Error::invalid_descriptor(
            d,
            "attempt to convert non-class descriptor to internal form",
        )),
    }
}

pub fn method_descriptor(params: &[Descriptor], ret: &Descriptor) -> String {
    let mut out = String::from("(");
    for p in params {
        out.push_str(p.as_str());
    }
    out.push(')');
    out.push_str(ret.as_str());
    out
}

pub fn parse_method_descriptor(d: &str) -> Result<(Vec<Descriptor>, Descriptor)> {
    if !d.starts_with('(') {
        return Err(Error::invalid_descriptor(d, "method descriptor must start with '('"));
    }
    let mut params = Vec::new();
    let mut i = 1;
    loop {
        match d.as_bytes().get(i) {
            None => return Err(Error::invalid_descriptor(d, "missing ')' in method descriptor")),
            Some(b')') => break,
            Some(_) => {
                let end = scan_field_type(d, i, false)?;
                params.push(Descriptor(d[i..end].to_string()));
                i = end;
            }
        }
    }
    let ret_start = i + 1;
    let end = scan_field_type(d, ret_start, true)?;
    if end != d.len() {
        return Err(Error::invalid_descriptor(d, "trailing characters after return type"));
    }
    Ok((params, Descriptor(d[ret_start..].to_string())))
}

/// A validated field descriptor (including `V`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(String);

impl Descriptor {
    pub fn new(d: impl Into<String>) -> Result<Self> {
        let d = d.into();
        let end = scan_field_type(&d, 0, true)?;
        if end != d.len() {
            return Err(Error::invalid_descriptor(d, "trailing characters after field descriptor"));
        }
        Ok(Self(d))
    }

    /// Wrap one of the well-known descriptor constants
    pub(crate) fn known(d: &'static str) -> Self {
        Self(d.to_string())
    }

    pub fn void() -> Self {
        Self::known(VOID)
    }

    pub fn boolean() -> Self {
        Self::known(BOOLEAN)
    }

    pub fn int() -> Self {
        Self::known(INT)
    }

    pub fn long() -> Self {
        Self::known(LONG)
    }

    pub fn double() -> Self {
        Self::known(DOUBLE)
    }

    pub fn object() -> Self {
        Self::known(OBJECT)
    }

    pub fn string() -> Self {
        Self::known(STRING)
    }

    pub fn from_class_name(class_name: &str) -> Result<Self> {
        Self::new(from_class_name(class_name)?)
    }

    pub fn from_internal_form(internal: &str) -> Result<Self> {
        Self::new(from_internal_form(internal)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_array(&self) -> bool {
        is_array(&self.0)
    }

    pub fn is_class_reference(&self) -> bool {
        is_class_reference(&self.0)
    }

    pub fn is_primitive(&self) -> bool {
        is_primitive(&self.0)
    }

    pub fn is_reference(&self) -> bool {
        is_reference(&self.0)
    }

    pub fn is_primitive_numeric(&self) -> bool {
        is_primitive_numeric(&self.0)
    }

    pub fn is_void(&self) -> bool {
        self.0 == VOID
    }

    pub fn is_boolean(&self) -> bool {
        self.0 == BOOLEAN
    }

    /// `long` or `double`
    pub fn is_wide(&self) -> bool {
        self.0 == LONG || self.0 == DOUBLE
    }

    /// Types that live on the operand stack as `int`
    pub fn is_int_like(&self) -> bool {
        matches!(self.0.as_str(), INT | SHORT | BYTE | CHAR | BOOLEAN)
    }

    pub fn size(&self) -> u8 {
        match self.0.as_str() {
            VOID => 0,
            LONG | DOUBLE => 2,
            _ => 1,
        }
    }

    pub fn component(&self) -> Option<Descriptor> {
        self.0.strip_prefix('[').map(|c| Descriptor(c.to_string()))
    }

    pub fn array_of(&self) -> Descriptor {
        Descriptor(format!("[{}", self.0))
    }

    pub fn dimensions(&self) -> usize {
        self.0.bytes().take_while(|b| *b == b'[').count()
    }

    /// Reflective class name, e.g. `java.lang.String` or `int`
    pub fn class_name(&self) -> String {
        to_class_name(&self.0).unwrap_or_else(|_| self.0.clone())
    }

    /// Constant-pool class name, `None` for primitives
    pub fn internal_name(&self) -> Option<String> {
        to_internal_form(&self.0).ok()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match display_field_type(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(&self.0),
        }
    }
}

impl AsRef<str> for Descriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_array("[I"));
        assert!(is_class_reference(STRING));
        assert!(is_primitive("V"));
        assert!(!is_primitive("Lx;"));
        assert!(is_reference("[[J"));
        assert!(is_primitive_numeric("C"));
        assert!(!is_primitive_numeric("Z"));
        assert!(!is_primitive_numeric("V"));
    }

    #[test]
    fn test_size() {
        assert_eq!(size("V").unwrap(), 0);
        assert_eq!(size("J").unwrap(), 2);
        assert_eq!(size("D").unwrap(), 2);
        assert_eq!(size("Z").unwrap(), 1);
        assert_eq!(size(STRING).unwrap(), 1);
        assert_eq!(size("[J").unwrap(), 1);
        assert!(size("Q").is_err());
        assert!(size("Ljava/lang/String").is_err());
        assert!(size("[Q").is_err());
        assert!(size("[").is_err());
        assert!(size("LA;LB;").is_err());
    }

    #[test]
    fn test_component_descriptor() {
        assert_eq!(component_descriptor("[[I").unwrap(), "[I");
        assert!(component_descriptor("I").is_err());
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(to_display_string("[I").unwrap(), "int[]");
        assert_eq!(to_display_string(STRING).unwrap(), "java.lang.String");
        assert_eq!(to_display_string("(ID)V").unwrap(), "(int, double) => void");
        assert_eq!(
            to_display_string("([Ljava/lang/String;)J").unwrap(),
            "(java.lang.String[]) => long"
        );
        assert!(to_display_string("(ID").is_err());
        assert!(to_display_string("Ljava/lang/String").is_err());
    }

    #[test]
    fn test_class_name_conversions() {
        assert_eq!(from_class_name("int").unwrap(), "I");
        assert_eq!(from_class_name("java.lang.String").unwrap(), STRING);
        assert_eq!(from_class_name("[Ljava.lang.String;").unwrap(), "[Ljava/lang/String;");
        assert_eq!(to_class_name("[Ljava/lang/String;").unwrap(), "[Ljava.lang.String;");
        assert_eq!(to_class_name("Z").unwrap(), "boolean");
        assert!(from_class_name("").is_err());
        assert!(to_class_name("L;").is_err());
        assert!(to_class_name("[Q").is_err());
        assert!(to_class_name("[").is_err());
        assert!(to_class_name("[[I;").is_err());
        assert!(to_class_name("Lfoo;bar;").is_err());
        assert!(from_class_name("[Q").is_err());
        assert!(from_class_name("[").is_err());
        assert!(from_class_name("[Ljava.lang.String").is_err());
    }

    #[test]
    fn test_internal_form() {
        assert_eq!(from_internal_form("java/util/Map").unwrap(), "Ljava/util/Map;");
        assert_eq!(from_internal_form("[I").unwrap(), "[I");
        assert_eq!(to_internal_form("Ljava/util/Map;").unwrap(), "java/util/Map");
        assert_eq!(to_internal_form("[I").unwrap(), "[I");
        assert!(to_internal_form("I").is_err());
    }

    #[test]
    fn test_method_descriptor_round_trip() {
        let (params, ret) = parse_method_descriptor("(I[JLjava/lang/String;)Z").unwrap();
        assert_eq!(
            params.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["I", "[J", STRING]
        );
        assert_eq!(ret.as_str(), "Z");
        assert_eq!(method_descriptor(&params, &ret), "(I[JLjava/lang/String;)Z");
        assert!(parse_method_descriptor("(V)V").is_err());
        assert!(parse_method_descriptor("(I").is_err());
    }

    #[test]
    fn test_descriptor_newtype() {
        let d = Descriptor::new("[[I").unwrap();
        assert_eq!(d.dimensions(), 2);
        assert_eq!(d.component().unwrap().as_str(), "[I");
        assert_eq!(d.to_string(), "int[][]");
        assert_eq!(Descriptor::string().internal_name().unwrap(), "java/lang/String");
        assert!(Descriptor::new("").is_err());
        assert!(Descriptor::new("[V").is_err());
        assert!(Descriptor::new("II").is_err());
    }
}

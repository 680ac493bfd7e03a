//! Constant pool and constants for Java class files

use std::collections::HashMap;

use super::defs::constant_tags::*;
use crate::codegen::error::CodegenError;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

/// Hashable identity of a constant, floats compared bitwise
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

impl Constant {
    fn key(&self) -> ConstantKey {
        match self {
            Constant::Utf8(s) => ConstantKey::Utf8(s.clone()),
            Constant::Integer(v) => ConstantKey::Integer(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(v.to_bits()),
            Constant::Class(i) => ConstantKey::Class(*i),
            Constant::String(i) => ConstantKey::String(*i),
            Constant::FieldRef(a, b) => ConstantKey::FieldRef(*a, *b),
            Constant::MethodRef(a, b) => ConstantKey::MethodRef(*a, *b),
            Constant::InterfaceMethodRef(a, b) => ConstantKey::InterfaceMethodRef(*a, *b),
            Constant::NameAndType(a, b) => ConstantKey::NameAndType(*a, *b),
        }
    }

    /// `long` and `double` entries occupy two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let encoded = encode_modified_utf8(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
        }
        bytes
    }
}

/// Class-file string encoding: UTF-16 code units, `U+0000` as two bytes,
/// supplementary characters as surrogate pairs of three bytes each
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Deduplicating constant pool; index 0 is never used
#[derive(Debug, Default)]
pub struct ConstantPool {
    constants: Vec<Option<Constant>>,
    index: HashMap<ConstantKey, u16>,
    next: u16,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new(), index: HashMap::new(), next: 1 }
    }

    /// Value of `constant_pool_count`
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.constants.get(index as usize - 1).and_then(|c| c.as_ref())
    }

    fn add(&mut self, constant: Constant) -> Result<u16, CodegenError> {
        let key = constant.key();
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.next as u32 + slots > u16::MAX as u32 {
            return Err(CodegenError::ConstantPoolOverflow);
        }
        let idx = self.next;
        let wide = constant.is_wide();
        self.constants.push(Some(constant));
        if wide {
            self.constants.push(None);
        }
        self.next += slots as u16;
        self.index.insert(key, idx);
        Ok(idx)
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16, CodegenError> {
        if encode_modified_utf8(value).len() > u16::MAX as usize {
            return Err(CodegenError::StringTooLong { length: value.len() });
        }
        self.add(Constant::Utf8(value.to_string()))
    }

    /// `internal_name` is slash-separated, or an array descriptor
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16, CodegenError> {
        let name_index = self.add_utf8(internal_name)?;
        self.add(Constant::Class(name_index))
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16, CodegenError> {
        let utf8 = self.add_utf8(value)?;
        self.add(Constant::String(utf8))
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16, CodegenError> {
        self.add(Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> Result<u16, CodegenError> {
        self.add(Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> Result<u16, CodegenError> {
        self.add(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> Result<u16, CodegenError> {
        self.add(Constant::Double(value))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, CodegenError> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, CodegenError> {
        let class_index = self.add_class(class)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef(class_index, nat))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, CodegenError> {
        let class_index = self.add_class(class)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef(class_index, nat))
    }

    pub fn add_interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, CodegenError> {
        let class_index = self.add_class(class)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::InterfaceMethodRef(class_index, nat))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.count().to_be_bytes());
        for constant in self.constants.iter().flatten() {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.add_class("java/lang/Object").unwrap();
        let b = pool.add_class("java/lang/Object").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        let l = pool.add_long(42).unwrap();
        let next = pool.add_integer(7).unwrap();
        assert_eq!(l, 1);
        assert_eq!(next, 3);
        assert_eq!(pool.get(2), None);
        assert_eq!(pool.get(3), Some(&Constant::Integer(7)));
    }

    #[test]
    fn test_nan_constants_share_an_entry() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_double(f64::NAN).unwrap(), pool.add_double(f64::NAN).unwrap());
        assert_ne!(pool.add_double(0.0).unwrap(), pool.add_double(-0.0).unwrap());
    }

    #[test]
    fn test_modified_utf8() {
        assert_eq!(encode_modified_utf8("a"), vec![b'a']);
        assert_eq!(encode_modified_utf8("\0"), vec![0xC0, 0x80]);
        assert_eq!(encode_modified_utf8("\u{e9}"), vec![0xC3, 0xA9]);
        assert_eq!(encode_modified_utf8("\u{1F600}").len(), 6);
    }
}

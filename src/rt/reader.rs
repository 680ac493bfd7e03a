//! Class-file reader built from nom combinators

use nom::{
    bytes::complete::{tag, take},
    multi::count,
    number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, be_u8},
    IResult,
};

use super::error::{RuntimeError, RuntimeResult};
use crate::codegen::defs::constant_tags::*;
use crate::codegen::defs::MAGIC;

/// Constant pool entry as stored in the image; wide entries are followed by `Unusable`
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
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
    Unusable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeData {
    pub name: String,
    pub info: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberData {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<AttributeData>,
}

impl MemberData {
    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A parsed class image; names are in internal (slash) form
#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: Vec<PoolEntry>,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberData>,
    pub methods: Vec<MemberData>,
    pub attributes: Vec<AttributeData>,
}

impl ClassData {
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MemberData> {
        self.methods.iter().find(|m| m.name == name && m.descriptor == descriptor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeData {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub attributes: Vec<AttributeData>,
}

/// Decode the class-file string encoding
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let trailing = |k: usize| -> Result<u16, String> {
            match bytes.get(i + k) {
                Some(c) if c & 0xC0 == 0x80 => Ok((c & 0x3F) as u16),
                _ => Err(format!("malformed string constant at byte {}", i)),
            }
        };
        if b & 0x80 == 0 && b != 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((((b & 0x1F) as u16) << 6) | trailing(1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push((((b & 0x0F) as u16) << 12) | (trailing(1)? << 6) | trailing(2)?);
            i += 3;
        } else {
            return Err(format!("malformed string constant at byte {}", i));
        }
    }
    String::from_utf16(&units).map_err(|e| e.to_string())
}

fn pair(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (input, a) = be_u16(input)?;
    let (input, b) = be_u16(input)?;
    Ok((input, (a, b)))
}

fn constant_parser(input: &[u8]) -> IResult<&[u8], PoolEntry> {
    let (input, tag_byte) = be_u8(input)?;
    match tag_byte {
        CONSTANT_UTF8 => {
            let (input, length) = be_u16(input)?;
            let (input, bytes) = take(length)(input)?;
            let text = decode_modified_utf8(bytes).map_err(|_| {
                nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
            })?;
            Ok((input, PoolEntry::Utf8(text)))
        }
        CONSTANT_INTEGER => {
            let (input, v) = be_i32(input)?;
            Ok((input, PoolEntry::Integer(v)))
        }
        CONSTANT_FLOAT => {
            let (input, v) = be_f32(input)?;
            Ok((input, PoolEntry::Float(v)))
        }
        CONSTANT_LONG => {
            let (input, v) = be_i64(input)?;
            Ok((input, PoolEntry::Long(v)))
        }
        CONSTANT_DOUBLE => {
            let (input, v) = be_f64(input)?;
            Ok((input, PoolEntry::Double(v)))
        }
        CONSTANT_CLASS => {
            let (input, i) = be_u16(input)?;
            Ok((input, PoolEntry::Class(i)))
        }
        CONSTANT_STRING => {
            let (input, i) = be_u16(input)?;
            Ok((input, PoolEntry::String(i)))
        }
        CONSTANT_FIELDREF => {
            let (input, (a, b)) = pair(input)?;
            Ok((input, PoolEntry::FieldRef(a, b)))
        }
        CONSTANT_METHODREF => {
            let (input, (a, b)) = pair(input)?;
            Ok((input, PoolEntry::MethodRef(a, b)))
        }
        CONSTANT_INTERFACEMETHODREF => {
            let (input, (a, b)) = pair(input)?;
            Ok((input, PoolEntry::InterfaceMethodRef(a, b)))
        }
        CONSTANT_NAMEANDTYPE => {
            let (input, (a, b)) = pair(input)?;
            Ok((input, PoolEntry::NameAndType(a, b)))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Switch))),
    }
}

fn constant_pool_parser(input: &[u8]) -> IResult<&[u8], Vec<PoolEntry>> {
    let (mut input, pool_count) = be_u16(input)?;
    let mut pool = Vec::with_capacity(pool_count as usize);
    while pool.len() + 1 < pool_count as usize {
        let (rest, entry) = constant_parser(input)?;
        input = rest;
        let wide = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
        pool.push(entry);
        if wide {
            pool.push(PoolEntry::Unusable);
        }
    }
    Ok((input, pool))
}

struct RawAttribute<'a> {
    name_index: u16,
    info: &'a [u8],
}

fn attribute_parser(input: &[u8]) -> IResult<&[u8], RawAttribute<'_>> {
    let (input, name_index) = be_u16(input)?;
    let (input, length) = be_u32(input)?;
    let (input, info) = take(length)(input)?;
    Ok((input, RawAttribute { name_index, info }))
}

fn attributes_parser(input: &[u8]) -> IResult<&[u8], Vec<RawAttribute<'_>>> {
    let (input, attributes_count) = be_u16(input)?;
    count(attribute_parser, attributes_count as usize)(input)
}

/// `(start_pc, line_number)` entries of a `LineNumberTable`
fn line_numbers_parser(input: &[u8]) -> IResult<&[u8], Vec<(u16, u16)>> {
    let (input, length) = be_u16(input)?;
    count(pair, length as usize)(input)
}

/// Constant pool indices of an `Exceptions` attribute
fn class_indices_parser(input: &[u8]) -> IResult<&[u8], Vec<u16>> {
    let (input, length) = be_u16(input)?;
    count(be_u16, length as usize)(input)
}

struct RawMember<'a> {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<RawAttribute<'a>>,
}

fn member_parser(input: &[u8]) -> IResult<&[u8], RawMember<'_>> {
    let (input, access_flags) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, attributes) = attributes_parser(input)?;
    Ok((input, RawMember { access_flags, name_index, descriptor_index, attributes }))
}

fn members_parser(input: &[u8]) -> IResult<&[u8], Vec<RawMember<'_>>> {
    let (input, members_count) = be_u16(input)?;
    count(member_parser, members_count as usize)(input)
}

struct RawClass<'a> {
    minor_version: u16,
    major_version: u16,
    pool: Vec<PoolEntry>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<RawMember<'a>>,
    methods: Vec<RawMember<'a>>,
    attributes: Vec<RawAttribute<'a>>,
}

fn class_parser(input: &[u8]) -> IResult<&[u8], RawClass<'_>> {
    let (input, _) = tag(&MAGIC.to_be_bytes()[..])(input)?;
    let (input, minor_version) = be_u16(input)?;
    let (input, major_version) = be_u16(input)?;
    let (input, pool) = constant_pool_parser(input)?;
    let (input, access_flags) = be_u16(input)?;
    let (input, this_class) = be_u16(input)?;
    let (input, super_class) = be_u16(input)?;
    let (input, interfaces_count) = be_u16(input)?;
    let (input, interfaces) = count(be_u16, interfaces_count as usize)(input)?;
    let (input, fields) = members_parser(input)?;
    let (input, methods) = members_parser(input)?;
    let (input, attributes) = attributes_parser(input)?;
    Ok((
        input,
        RawClass {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        },
    ))
}

fn utf8_at(pool: &[PoolEntry], index: u16) -> Result<String, String> {
    match index.checked_sub(1).and_then(|i| pool.get(i as usize)) {
        Some(PoolEntry::Utf8(s)) => Ok(s.clone()),
        _ => Err(format!("expected Utf8 constant at index {}", index)),
    }
}

fn class_name_at(pool: &[PoolEntry], index: u16) -> Result<String, String> {
    match index.checked_sub(1).and_then(|i| pool.get(i as usize)) {
        Some(PoolEntry::Class(name_index)) => utf8_at(pool, *name_index),
        _ => Err(format!("expected Class constant at index {}", index)),
    }
}

fn resolve_attributes(pool: &[PoolEntry], raw: &[RawAttribute<'_>]) -> Result<Vec<AttributeData>, String> {
    raw.iter()
        .map(|a| Ok(AttributeData { name: utf8_at(pool, a.name_index)?, info: a.info.to_vec() }))
        .collect()
}

fn resolve_members(pool: &[PoolEntry], raw: &[RawMember<'_>]) -> Result<Vec<MemberData>, String> {
    raw.iter()
        .map(|m| {
            Ok(MemberData {
                access_flags: m.access_flags,
                name: utf8_at(pool, m.name_index)?,
                descriptor: utf8_at(pool, m.descriptor_index)?,
                attributes: resolve_attributes(pool, &m.attributes)?,
            })
        })
        .collect()
}

/// Parse a complete class image
pub fn parse_class(bytes: &[u8]) -> RuntimeResult<ClassData> {
    let invalid = |message: String| RuntimeError::invalid_bytecode("<unknown>", message);
    let (rest, raw) = class_parser(bytes).map_err(|e| invalid(format!("truncated or malformed class file: {:?}", e)))?;
    if !rest.is_empty() {
        return Err(invalid(format!("{} trailing bytes after class file", rest.len())));
    }
    let pool = &raw.pool;
    let this_class = class_name_at(pool, raw.this_class).map_err(invalid)?;
    let named = |message: String| RuntimeError::invalid_bytecode(this_class.replace('/', "."), message);
    let super_class = if raw.super_class == 0 {
        None
    } else {
        Some(class_name_at(pool, raw.super_class).map_err(named)?)
    };
    let interfaces = raw
        .interfaces
        .iter()
        .map(|i| class_name_at(pool, *i))
        .collect::<Result<Vec<_>, _>>()
        .map_err(named)?;
    let fields = resolve_members(pool, &raw.fields).map_err(named)?;
    let methods = resolve_members(pool, &raw.methods).map_err(named)?;
    let attributes = resolve_attributes(pool, &raw.attributes).map_err(named)?;
    Ok(ClassData {
        minor_version: raw.minor_version,
        major_version: raw.major_version,
        pool: raw.pool.clone(),
        access_flags: raw.access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn code_parser(input: &[u8]) -> IResult<&[u8], (u16, u16, &[u8], Vec<RawAttribute<'_>>)> {
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, code_length) = be_u32(input)?;
    let (input, code) = take(code_length)(input)?;
    let (input, exception_table_length) = be_u16(input)?;
    let (input, _) = take(exception_table_length as usize * 8)(input)?;
    let (input, attributes) = attributes_parser(input)?;
    Ok((input, (max_stack, max_locals, code, attributes)))
}

/// Parse the body of a `Code` attribute, resolving nested attribute names against `pool`
pub fn parse_code(info: &[u8], pool: &[PoolEntry]) -> Result<CodeData, String> {
    let (_, (max_stack, max_locals, code, raw)) =
        code_parser(info).map_err(|e| format!("malformed Code attribute: {:?}", e))?;
    let attributes = resolve_attributes(pool, &raw)?;
    Ok(CodeData { max_stack, max_locals, code: code.to_vec(), attributes })
}

pub fn parse_line_numbers(info: &[u8]) -> Result<Vec<(u16, u16)>, String> {
    line_numbers_parser(info)
        .map(|(_, entries)| entries)
        .map_err(|e| format!("malformed LineNumberTable: {:?}", e))
}

pub fn parse_exceptions(info: &[u8], pool: &[PoolEntry]) -> Result<Vec<String>, String> {
    let (_, indices) = class_indices_parser(info).map_err(|e| format!("malformed Exceptions attribute: {:?}", e))?;
    indices.into_iter().map(|i| class_name_at(pool, i)).collect()
}

pub fn parse_source_file(info: &[u8], pool: &[PoolEntry]) -> Result<String, String> {
    let (_, index) = be_u16::<_, nom::error::Error<&[u8]>>(info).map_err(|e| format!("malformed SourceFile: {:?}", e))?;
    utf8_at(pool, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_utf8_decoding() {
        assert_eq!(decode_modified_utf8(b"abc").unwrap(), "abc");
        assert_eq!(decode_modified_utf8(&[0xC0, 0x80]).unwrap(), "\0");
        assert_eq!(decode_modified_utf8(&[0xC3, 0xA9]).unwrap(), "\u{e9}");
        assert!(decode_modified_utf8(&[0xC3]).is_err());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = parse_class(&[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidBytecode { .. }));
    }

    #[test]
    fn test_line_numbers() {
        let entries = parse_line_numbers(&[0, 2, 0, 0, 0, 7, 0, 4, 0, 8]).unwrap();
        assert_eq!(entries, vec![(0, 7), (4, 8)]);
        assert!(parse_line_numbers(&[0, 2, 0, 0]).is_err());
    }

    #[test]
    fn test_exceptions() {
        let pool = vec![PoolEntry::Utf8("java/lang/Exception".to_string()), PoolEntry::Class(1)];
        assert_eq!(parse_exceptions(&[0, 1, 0, 2], &pool).unwrap(), vec!["java/lang/Exception".to_string()]);
        assert!(parse_exceptions(&[0, 1, 0, 1], &pool).is_err());
    }
}

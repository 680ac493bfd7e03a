//! Attribute structures for Java class files

use super::constpool::ConstantPool;
use super::defs::attribute_names;
use super::error::CodegenResult;

#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.info.len());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

/// `(start_pc, line_number)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineNumberTable {
    pub entries: Vec<(u16, u16)>,
}

impl LineNumberTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_attribute(&self, pool: &mut ConstantPool) -> CodegenResult<AttributeInfo> {
        let name_index = pool.add_utf8(attribute_names::LINE_NUMBER_TABLE)?;
        let mut info = Vec::with_capacity(2 + 4 * self.entries.len());
        info.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for (pc, line) in &self.entries {
            info.extend_from_slice(&pc.to_be_bytes());
            info.extend_from_slice(&line.to_be_bytes());
        }
        Ok(AttributeInfo::new(name_index, info))
    }
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self { max_stack, max_locals, code, attributes: Vec::new() }
    }

    /// Exception tables are always empty: the language subset has no `try`
    pub fn to_attribute(&self, pool: &mut ConstantPool) -> CodegenResult<AttributeInfo> {
        let name_index = pool.add_utf8(attribute_names::CODE)?;
        let mut info = Vec::new();
        info.extend_from_slice(&self.max_stack.to_be_bytes());
        info.extend_from_slice(&self.max_locals.to_be_bytes());
        info.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        info.extend_from_slice(&self.code);
        info.extend_from_slice(&0u16.to_be_bytes());
        info.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            info.extend_from_slice(&attribute.to_bytes());
        }
        Ok(AttributeInfo::new(name_index, info))
    }
}

pub fn source_file_attribute(pool: &mut ConstantPool, file_name: &str) -> CodegenResult<AttributeInfo> {
    let name_index = pool.add_utf8(attribute_names::SOURCE_FILE)?;
    let file_index = pool.add_utf8(file_name)?;
    Ok(AttributeInfo::new(name_index, file_index.to_be_bytes().to_vec()))
}

/// `throws` clause; `internal_names` are slash-separated class names
pub fn exceptions_attribute(pool: &mut ConstantPool, internal_names: &[String]) -> CodegenResult<AttributeInfo> {
    let name_index = pool.add_utf8(attribute_names::EXCEPTIONS)?;
    let mut info = Vec::with_capacity(2 + 2 * internal_names.len());
    info.extend_from_slice(&(internal_names.len() as u16).to_be_bytes());
    for name in internal_names {
        let class_index = pool.add_class(name)?;
        info.extend_from_slice(&class_index.to_be_bytes());
    }
    Ok(AttributeInfo::new(name_index, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_number_table_layout() {
        let mut pool = ConstantPool::new();
        let table = LineNumberTable { entries: vec![(0, 3), (5, 4)] };
        let attr = table.to_attribute(&mut pool).unwrap();
        assert_eq!(attr.info, vec![0, 2, 0, 0, 0, 3, 0, 5, 0, 4]);
        assert_eq!(attr.to_bytes().len(), 6 + 10);
    }

    #[test]
    fn test_code_attribute_layout() {
        let mut pool = ConstantPool::new();
        let code = CodeAttribute::new(1, 1, vec![0x04, 0xac]);
        let attr = code.to_attribute(&mut pool).unwrap();
        // max_stack, max_locals, code_length, code, exception table, attributes
        assert_eq!(attr.info.len(), 2 + 2 + 4 + 2 + 2 + 2);
        assert_eq!(&attr.info[8..10], &[0x04, 0xac]);
    }
}

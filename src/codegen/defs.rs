//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// JVM version constants
pub mod major_versions {
    pub const JAVA_1_4: u16 = 48;
    /// Last version whose verifier does not require `StackMapTable`
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_8: u16 = 52;
}

pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
}

/// Constant pool tags
pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
}

/// Attribute names
pub mod attribute_names {
    pub const CODE: &str = "Code";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const EXCEPTIONS: &str = "Exceptions";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
}

/// `newarray` element type codes
pub mod array_types {
    pub const T_BOOLEAN: u8 = 4;
    pub const T_CHAR: u8 = 5;
    pub const T_FLOAT: u8 = 6;
    pub const T_DOUBLE: u8 = 7;
    pub const T_BYTE: u8 = 8;
    pub const T_SHORT: u8 = 9;
    pub const T_INT: u8 = 10;
    pub const T_LONG: u8 = 11;

    /// Element type code for a primitive descriptor letter
    pub fn for_descriptor(d: &str) -> Option<u8> {
        match d {
            "Z" => Some(T_BOOLEAN),
            "C" => Some(T_CHAR),
            "F" => Some(T_FLOAT),
            "D" => Some(T_DOUBLE),
            "B" => Some(T_BYTE),
            "S" => Some(T_SHORT),
            "I" => Some(T_INT),
            "J" => Some(T_LONG),
            _ => None,
        }
    }

    /// Inverse of [`for_descriptor`]
    pub fn descriptor(code: u8) -> Option<&'static str> {
        match code {
            T_BOOLEAN => Some("Z"),
            T_CHAR => Some("C"),
            T_FLOAT => Some("F"),
            T_DOUBLE => Some("D"),
            T_BYTE => Some("B"),
            T_SHORT => Some("S"),
            T_INT => Some("I"),
            T_LONG => Some("J"),
            _ => None,
        }
    }
}

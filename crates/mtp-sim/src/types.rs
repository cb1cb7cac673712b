// crates/mtp-sim/src/types.rs

//! Small enums shared by the node model, the engine and the address space.

use crate::value::TagValue;
use serde::Serialize;
use std::fmt;

/// Class of a node in the node model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NodeClass {
    #[default]
    Folder,
    Object,
    Variable,
}

/// Value type of a variable, classified from the declared type text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    Boolean,
    String,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    DateTime,
}

impl DataType {
    /// Classifies a declared data type such as `xs:double`, `Int32` or `Boolean`.
    ///
    /// XML schema prefixes (`xs:`, `xsd:`) are ignored and matching is
    /// case-insensitive. Returns `None` for types this table does not know.
    pub fn parse(declared: &str) -> Option<Self> {
        let t = declared.trim();
        let t = strip_prefix_ignore_case(t, "xs:")
            .or_else(|| strip_prefix_ignore_case(t, "xsd:"))
            .unwrap_or(t);

        let data_type = match t.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Boolean,
            "string" | "normalizedstring" | "token" | "anyuri" | "qname" | "notation"
            | "base64binary" | "hexbinary" => Self::String,
            "byte" | "unsignedbyte" => Self::Byte,
            "sbyte" => Self::SByte,
            "short" | "int16" => Self::Int16,
            "unsignedshort" | "uint16" => Self::UInt16,
            "int" | "integer" | "int32" => Self::Int32,
            "unsignedint" | "uint32" | "positiveinteger" | "nonpositiveinteger"
            | "nonnegativeinteger" | "negativeinteger" => Self::UInt32,
            "long" | "int64" => Self::Int64,
            "unsignedlong" | "uint64" => Self::UInt64,
            "float" | "single" => Self::Float,
            // Decimal is simulated as a double.
            "double" | "decimal" => Self::Double,
            "datetime" | "date" | "time" | "gyear" | "gmonth" | "gday" | "gyearmonth"
            | "gmonthday" | "duration" => Self::DateTime,
            _ => return None,
        };
        Some(data_type)
    }

    /// Like [`DataType::parse`], but blank or unknown declarations become `Double`.
    ///
    /// Descriptors in the wild carry vendor-specific type names; treating them as
    /// doubles keeps such files loadable.
    pub fn from_declared(declared: Option<&str>) -> Self {
        match declared {
            None => Self::Double,
            Some(d) if d.trim().is_empty() => Self::Double,
            Some(d) => Self::parse(d).unwrap_or_else(|| {
                log::warn!("[Types] Unknown data type '{}', defaulting to Double", d);
                Self::Double
            }),
        }
    }

    /// True for every integer and floating-point type.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }

    /// The zero value a freshly created variable of this type holds.
    pub fn default_value(self) -> TagValue {
        match self {
            Self::Boolean => TagValue::Boolean(false),
            Self::String | Self::DateTime => TagValue::Text(String::new()),
            _ => TagValue::Number(0.0),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Access rights declared for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessLevel {
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessLevel {
    /// Maps the descriptor's small integer code (0..=3).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// Parses the textual code; anything unparsable leaves access unset.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<u8>().ok().and_then(Self::from_code)
    }

    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

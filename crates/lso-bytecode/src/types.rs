//! Value type tags shared by the image format and the VM
//!
//! The numeric values match LSL's `TYPE_*` constants, so the tag returned by
//! `llGetListEntryType` is the same byte that appears in the image.

use std::fmt;

/// Runtime type tag of an LSL value
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value (void return, invalid list entry)
    Void = 0,
    /// 32-bit signed integer
    Integer = 1,
    /// 32-bit float
    Float = 2,
    /// UTF-8 string
    String = 3,
    /// UUID in string form
    Key = 4,
    /// Three-component float vector
    Vector = 5,
    /// Quaternion (x, y, z, s)
    Rotation = 6,
    /// Heterogeneous list of non-list values
    List = 7,
}

impl ValueType {
    /// Convert a tag byte to a type
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Void),
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::String),
            4 => Some(Self::Key),
            5 => Some(Self::Vector),
            6 => Some(Self::Rotation),
            7 => Some(Self::List),
            _ => None,
        }
    }

    /// Convert to the tag byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// LSL type-code character used in compact signatures
    ///
    /// `""` in a signature string means void, so `Void` has no code.
    pub fn code(self) -> Option<char> {
        match self {
            Self::Void => None,
            Self::Integer => Some('i'),
            Self::Float => Some('f'),
            Self::String => Some('s'),
            Self::Key => Some('k'),
            Self::Vector => Some('v'),
            Self::Rotation => Some('q'),
            Self::List => Some('l'),
        }
    }

    /// Parse an LSL type-code character
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(Self::Integer),
            'f' => Some(Self::Float),
            's' => Some(Self::String),
            'k' => Some(Self::Key),
            'v' => Some(Self::Vector),
            'q' => Some(Self::Rotation),
            'l' => Some(Self::List),
            _ => None,
        }
    }

    /// Whether values of this type live in the heap rather than inline in a slot
    pub fn is_heap(self) -> bool {
        matches!(self, Self::String | Self::Key | Self::List)
    }

    /// LSL keyword for this type
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Key => "key",
            Self::Vector => "vector",
            Self::Rotation => "rotation",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand types of a binary operator, packed into one byte
///
/// The high nibble is the left operand, the low nibble the right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandTypes {
    /// Type of the left operand (pushed first)
    pub lhs: ValueType,
    /// Type of the right operand (top of stack)
    pub rhs: ValueType,
}

impl OperandTypes {
    /// Create an operand pair
    pub const fn new(lhs: ValueType, rhs: ValueType) -> Self {
        Self { lhs, rhs }
    }

    /// Both operands of the same type
    pub const fn same(ty: ValueType) -> Self {
        Self { lhs: ty, rhs: ty }
    }

    /// Decode a packed operand byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(Self {
            lhs: ValueType::from_u8(byte >> 4)?,
            rhs: ValueType::from_u8(byte & 0x0F)?,
        })
    }

    /// Pack into a single byte
    pub fn to_u8(self) -> u8 {
        (self.lhs.to_u8() << 4) | self.rhs.to_u8()
    }
}

impl fmt::Display for OperandTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lhs, self.rhs)
    }
}

//! Typed runtime values
//!
//! A [`Value`] is the owned, by-value form of an LSL datum. The engine
//! materializes values from stack slots and heap blocks whenever an
//! instruction or library call needs its operands; every copy owns its own
//! storage, so mutating one never affects another.

use crate::convert::{
    format_float, format_rotation, format_rotation_with, format_vector, format_vector_with,
    is_valid_key, parse_float_prefix, parse_int_prefix, parse_rotation, parse_vector,
};
use crate::math::{Quaternion, Vector};
use lso_bytecode::{Constant, ValueType};
use std::fmt;

/// Bytes charged for a heap block header
pub const BLOCK_HEADER_BYTES: usize = 4;

/// An owned LSL value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),
    /// 32-bit float
    Float(f32),
    /// String
    String(String),
    /// UUID in string form (not necessarily valid)
    Key(String),
    /// Vector
    Vector(Vector),
    /// Rotation
    Rotation(Quaternion),
    /// List; elements are never lists themselves
    List(Vec<Value>),
}

impl Value {
    /// Build a string value
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Build a key value
    pub fn key(s: impl Into<String>) -> Self {
        Self::Key(s.into())
    }

    /// Runtime type tag
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Key(_) => ValueType::Key,
            Self::Vector(_) => ValueType::Vector,
            Self::Rotation(_) => ValueType::Rotation,
            Self::List(_) => ValueType::List,
        }
    }

    /// Zero value of a type; `None` for `Void`
    pub fn default_for(ty: ValueType) -> Option<Self> {
        Some(match ty {
            ValueType::Void => return None,
            ValueType::Integer => Self::Integer(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::String => Self::String(String::new()),
            ValueType::Key => Self::Key(String::new()),
            ValueType::Vector => Self::Vector(Vector::ZERO),
            ValueType::Rotation => Self::Rotation(Quaternion::IDENTITY),
            ValueType::List => Self::List(Vec::new()),
        })
    }

    // ===== Accessors =====

    /// Integer payload
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a string or key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Key(s) => Some(s),
            _ => None,
        }
    }

    /// Vector payload
    pub fn as_vector(&self) -> Option<Vector> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Rotation payload
    pub fn as_rotation(&self) -> Option<Quaternion> {
        match self {
            Self::Rotation(q) => Some(*q),
            _ => None,
        }
    }

    /// List elements
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    // ===== LSL semantics =====

    /// Condition value used by `if`/`while`
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Integer(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Key(k) => is_valid_key(k),
            Self::Vector(v) => !v.is_zero(),
            Self::Rotation(q) => !q.is_identity(),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Explicit `(type)value` conversion; `None` if LSL forbids it
    pub fn cast(&self, target: ValueType) -> Option<Self> {
        if self.value_type() == target {
            return Some(self.clone());
        }
        Some(match (target, self) {
            (ValueType::Integer, Self::Float(f)) => Self::Integer(float_to_int(*f)),
            (ValueType::Integer, Self::String(s)) => Self::Integer(parse_int_prefix(s)),
            (ValueType::Float, Self::Integer(i)) => Self::Float(*i as f32),
            (ValueType::Float, Self::String(s)) => Self::Float(parse_float_prefix(s)),
            (ValueType::String, v) => Self::String(v.to_string()),
            (ValueType::Key, Self::String(s)) => Self::Key(s.clone()),
            (ValueType::Vector, Self::String(s)) => {
                Self::Vector(parse_vector(s).unwrap_or(Vector::ZERO))
            }
            (ValueType::Rotation, Self::String(s)) => {
                Self::Rotation(parse_rotation(s).unwrap_or(Quaternion::IDENTITY))
            }
            (ValueType::List, v) => Self::List(vec![v.clone()]),
            _ => return None,
        })
    }

    /// Bytes this value occupies when stored in the heap
    pub fn heap_size(&self) -> usize {
        match self {
            Self::Integer(_) | Self::Float(_) => 4,
            Self::Vector(_) => 12,
            Self::Rotation(_) => 16,
            Self::String(s) | Self::Key(s) => BLOCK_HEADER_BYTES + s.len(),
            Self::List(items) => {
                BLOCK_HEADER_BYTES + items.iter().map(Value::heap_size).sum::<usize>()
            }
        }
    }
}

/// `(integer)float`: truncate toward zero; NaN and out-of-range give `i32::MIN`
pub fn float_to_int(f: f32) -> i32 {
    if f.is_nan() || f >= 2_147_483_648.0 || f < -2_147_483_648.0 {
        i32::MIN
    } else {
        f as i32
    }
}

impl Value {
    /// String form of a list element
    ///
    /// Vectors and rotations get six decimals here, one more than a direct
    /// `(string)` cast gives them.
    pub fn to_list_string(&self) -> String {
        match self {
            Self::Vector(v) => format_vector_with(*v, 6),
            Self::Rotation(q) => format_rotation_with(*q, 6),
            Self::List(items) => items.iter().map(Value::to_list_string).collect(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    /// `(string)value`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::String(s) | Self::Key(s) => f.write_str(s),
            Self::Vector(v) => f.write_str(&format_vector(*v)),
            Self::Rotation(q) => f.write_str(&format_rotation(*q)),
            Self::List(items) => items
                .iter()
                .try_for_each(|item| f.write_str(&item.to_list_string())),
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Integer(v) => Self::Integer(*v),
            Constant::Float(v) => Self::Float(*v),
            Constant::String(s) => Self::String(s.clone()),
            Constant::Key(s) => Self::Key(s.clone()),
            Constant::Vector(v) => Self::Vector(Vector::from_array(*v)),
            Constant::Rotation(q) => Self::Rotation(Quaternion::from_array(*q)),
            Constant::List(items) => Self::List(items.iter().map(Value::from).collect()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        Self::Vector(v)
    }
}

impl From<Quaternion> for Value {
    fn from(q: Quaternion) -> Self {
        Self::Rotation(q)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_are_independent() {
        let original = Value::List(vec![Value::string("a"), Value::Integer(1)]);
        let mut copy = original.clone();
        if let Value::List(items) = &mut copy {
            items.push(Value::Float(2.0));
        }
        assert_eq!(original.as_list().unwrap().len(), 2);
        assert_eq!(copy.as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_list_cast_formats_vectors_with_six_decimals() {
        let v = Vector::new(1.0, 2.0, 3.0);
        assert_eq!(Value::Vector(v).to_string(), "<1.00000, 2.00000, 3.00000>");
        let list = Value::List(vec![Value::Integer(1), Value::Vector(v)]);
        assert_eq!(list.to_string(), "1<1.000000, 2.000000, 3.000000>");
    }

    #[test]
    fn test_casts() {
        assert_eq!(Value::Float(-3.9).cast(ValueType::Integer), Some(Value::Integer(-3)));
        assert_eq!(Value::string("12abc").cast(ValueType::Integer), Some(Value::Integer(12)));
        assert_eq!(Value::Integer(5).cast(ValueType::String), Some(Value::string("5")));
        assert_eq!(Value::Float(0.5).cast(ValueType::String), Some(Value::string("0.500000")));
        assert_eq!(
            Value::string("<1,2,3>").cast(ValueType::Vector),
            Some(Value::Vector(Vector::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(
            Value::string("junk").cast(ValueType::Rotation),
            Some(Value::Rotation(Quaternion::IDENTITY))
        );
        assert_eq!(
            Value::Integer(1).cast(ValueType::List),
            Some(Value::List(vec![Value::Integer(1)]))
        );
        assert_eq!(Value::Vector(Vector::ZERO).cast(ValueType::Integer), None);
        assert_eq!(Value::Integer(1).cast(ValueType::Key), None);
    }

    #[test]
    fn test_float_to_int_edges() {
        assert_eq!(float_to_int(f32::NAN), i32::MIN);
        assert_eq!(float_to_int(3e9), i32::MIN);
        assert_eq!(float_to_int(-2_147_483_648.0), i32::MIN);
        assert_eq!(float_to_int(2.999), 2);
    }

    #[test]
    fn test_list_to_string() {
        let list = Value::List(vec![
            Value::Integer(1),
            Value::Float(2.0),
            Value::string("x"),
            Value::Vector(Vector::new(1.0, 0.0, 0.0)),
        ]);
        assert_eq!(list.to_string(), "12.000000x<1.00000, 0.00000, 0.00000>");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Float(0.1).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::key("00000000-0000-0000-0000-000000000000").is_truthy());
        assert!(!Value::Rotation(Quaternion::IDENTITY).is_truthy());
        assert!(Value::List(vec![Value::Integer(0)]).is_truthy());
    }

    #[test]
    fn test_heap_size() {
        assert_eq!(Value::string("abcd").heap_size(), 8);
        let list = Value::List(vec![Value::Integer(1), Value::string("ab")]);
        assert_eq!(list.heap_size(), 4 + 4 + 6);
    }

    #[test]
    fn test_from_constant() {
        let constant = Constant::List(vec![Constant::Key("k".into()), Constant::Vector([1.0, 2.0, 3.0])]);
        assert_eq!(
            Value::from(&constant),
            Value::List(vec![Value::key("k"), Value::Vector(Vector::new(1.0, 2.0, 3.0))])
        );
    }
}

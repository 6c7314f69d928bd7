//! Operator semantics
//!
//! Pure functions over materialized [`Value`]s. The interpreter has already
//! checked the operand tags against the instruction's declared types, so
//! these only decide what each LSL operator means for a type pair.

use crate::math::Vector;
use crate::value::Value;
use crate::{VmError, VmResult};
use lso_bytecode::{ArithOp, CompareOp, IntOp, ValueType};

fn arith_name(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Mod => "%",
    }
}

fn compare_name(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::Neq => "!=",
        CompareOp::Lt => "<",
        CompareOp::Gt => ">",
        CompareOp::Le => "<=",
        CompareOp::Ge => ">=",
    }
}

fn invalid(op: &'static str, lhs: &Value, rhs: &Value) -> VmError {
    VmError::InvalidOperands {
        op,
        lhs: lhs.value_type(),
        rhs: rhs.value_type(),
    }
}

/// Integer or float operand widened to float
fn number(v: &Value) -> Option<f32> {
    match v {
        Value::Integer(i) => Some(*i as f32),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn text(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) | Value::Key(s) => Some(s),
        _ => None,
    }
}

// ===== Arithmetic =====

/// `lhs <op> rhs` for the arithmetic operators
pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> VmResult<Value> {
    let name = arith_name(op);
    let result = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(int_arith(op, *a, *b)?),

        (Value::List(a), Value::List(b)) if op == ArithOp::Add => {
            Value::List(a.iter().chain(b).cloned().collect())
        }
        (Value::List(a), b) if op == ArithOp::Add => {
            let mut items = a.clone();
            items.push(b.clone());
            Value::List(items)
        }
        (a, Value::List(b)) if op == ArithOp::Add => {
            let mut items = Vec::with_capacity(b.len() + 1);
            items.push(a.clone());
            items.extend(b.iter().cloned());
            Value::List(items)
        }

        (Value::Vector(a), Value::Vector(b)) => match op {
            ArithOp::Add => Value::Vector(*a + *b),
            ArithOp::Sub => Value::Vector(*a - *b),
            ArithOp::Mul => Value::Float(a.dot(*b)),
            ArithOp::Mod => Value::Vector(a.cross(*b)),
            ArithOp::Div => return Err(invalid(name, lhs, rhs)),
        },
        (Value::Vector(v), Value::Rotation(q)) => match op {
            ArithOp::Mul => Value::Vector(v.rotate(*q)),
            ArithOp::Div => Value::Vector(v.rotate(q.conjugate())),
            _ => return Err(invalid(name, lhs, rhs)),
        },
        (Value::Rotation(a), Value::Rotation(b)) => match op {
            ArithOp::Add => Value::Rotation(*a + *b),
            ArithOp::Sub => Value::Rotation(*a - *b),
            ArithOp::Mul => Value::Rotation(a.compose(*b)),
            ArithOp::Div => Value::Rotation(a.divide(*b)),
            ArithOp::Mod => return Err(invalid(name, lhs, rhs)),
        },
        (Value::Vector(v), s) => match (op, number(s)) {
            (ArithOp::Mul, Some(s)) => Value::Vector(v.scale(s)),
            (ArithOp::Div, Some(s)) => Value::Vector(divide_vector(*v, s)?),
            _ => return Err(invalid(name, lhs, rhs)),
        },
        (s, Value::Vector(v)) => match (op, number(s)) {
            (ArithOp::Mul, Some(s)) => Value::Vector(v.scale(s)),
            _ => return Err(invalid(name, lhs, rhs)),
        },

        _ => match (number(lhs), number(rhs), text(lhs), text(rhs)) {
            (Some(a), Some(b), _, _) if op != ArithOp::Mod => Value::Float(float_arith(op, a, b)?),
            (_, _, Some(a), Some(b)) if op == ArithOp::Add => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Value::String(joined)
            }
            _ => return Err(invalid(name, lhs, rhs)),
        },
    };
    Ok(result)
}

fn int_arith(op: ArithOp, a: i32, b: i32) -> VmResult<i32> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div => {
            if b == 0 {
                return Err(VmError::MathError("integer division by zero"));
            }
            a.wrapping_div(b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err(VmError::MathError("integer modulo by zero"));
            }
            a.wrapping_rem(b)
        }
    })
}

/// Float arithmetic (LSL rejects `%` on floats before getting here)
fn float_arith(op: ArithOp, a: f32, b: f32) -> VmResult<f32> {
    Ok(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Mod => a % b,
        ArithOp::Div => {
            if b == 0.0 {
                return Err(VmError::MathError("float division by zero"));
            }
            a / b
        }
    })
}

fn divide_vector(v: Vector, s: f32) -> VmResult<Vector> {
    if s == 0.0 {
        return Err(VmError::MathError("vector division by zero"));
    }
    Ok(v.scale(1.0 / s))
}

/// Unary minus
pub fn negate(v: &Value) -> VmResult<Value> {
    Ok(match v {
        Value::Integer(i) => Value::Integer(i.wrapping_neg()),
        Value::Float(f) => Value::Float(-*f),
        Value::Vector(v) => Value::Vector(-*v),
        Value::Rotation(q) => Value::Rotation(-*q),
        other => {
            return Err(VmError::InvalidOperands {
                op: "-",
                lhs: ValueType::Void,
                rhs: other.value_type(),
            })
        }
    })
}

// ===== Comparison =====

/// `lhs <op> rhs` for the comparison operators, as an LSL integer
pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> VmResult<i32> {
    let name = compare_name(op);

    if let (Value::List(a), Value::List(b)) = (lhs, rhs) {
        return match op {
            CompareOp::Eq => Ok((a.len() == b.len()) as i32),
            CompareOp::Neq => Ok(a.len() as i32 - b.len() as i32),
            _ => Err(invalid(name, lhs, rhs)),
        };
    }

    let ordering = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
        _ => match (number(lhs), number(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let numeric = number(lhs).is_some() && number(rhs).is_some();

    let equal = match (lhs, rhs) {
        _ if numeric => ordering == Some(std::cmp::Ordering::Equal),
        (Value::Vector(a), Value::Vector(b)) => a == b,
        (Value::Rotation(a), Value::Rotation(b)) => a == b,
        _ => match (text(lhs), text(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => return Err(invalid(name, lhs, rhs)),
        },
    };

    let result = match op {
        CompareOp::Eq => equal,
        CompareOp::Neq => !equal,
        _ if !numeric => return Err(invalid(name, lhs, rhs)),
        CompareOp::Lt => ordering.is_some_and(|o| o.is_lt()),
        CompareOp::Gt => ordering.is_some_and(|o| o.is_gt()),
        CompareOp::Le => ordering.is_some_and(|o| o.is_le()),
        CompareOp::Ge => ordering.is_some_and(|o| o.is_ge()),
    };
    Ok(result as i32)
}

// ===== Integer operators =====

/// Binary integer operator; unary operators apply to `b`
pub fn int_binary(op: IntOp, a: i32, b: i32) -> i32 {
    match op {
        IntOp::BitAnd => a & b,
        IntOp::BitOr => a | b,
        IntOp::BitXor => a ^ b,
        IntOp::Shl => a.wrapping_shl(b as u32 & 31),
        IntOp::Shr => a.wrapping_shr(b as u32 & 31),
        IntOp::BoolAnd => (a != 0 && b != 0) as i32,
        IntOp::BoolOr => (a != 0 || b != 0) as i32,
        IntOp::BitNot | IntOp::BoolNot => int_unary(op, b),
    }
}

/// Unary integer operator
pub fn int_unary(op: IntOp, a: i32) -> i32 {
    match op {
        IntOp::BitNot => !a,
        IntOp::BoolNot => (a == 0) as i32,
        _ => a,
    }
}

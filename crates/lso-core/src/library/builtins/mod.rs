//! Builtin `ll*` library functions
//!
//! Each submodule registers one family of builtins by name into a
//! [`LibraryTable`]. Implementations receive arguments that already match
//! their declared signature; the accessor helpers below still return
//! `Result` so a table misconfiguration surfaces as an error, never a panic.

mod crypto;
mod list;
mod math;
mod rotation;
mod string;
mod time;

use super::{CallContext, LibraryError, LibraryTable, Signature};
use crate::math::{Quaternion, Vector};
use crate::value::Value;
use lso_bytecode::ValueType;

pub(crate) const VOID: ValueType = ValueType::Void;
pub(crate) const INT: ValueType = ValueType::Integer;
pub(crate) const FLOAT: ValueType = ValueType::Float;
pub(crate) const STR: ValueType = ValueType::String;
pub(crate) const KEY: ValueType = ValueType::Key;
pub(crate) const VEC: ValueType = ValueType::Vector;
pub(crate) const ROT: ValueType = ValueType::Rotation;
pub(crate) const LIST: ValueType = ValueType::List;

/// Register every builtin family
pub fn register_all(table: &mut LibraryTable) {
    math::register(table);
    rotation::register(table);
    string::register(table);
    list::register(table);
    time::register(table);
    crypto::register(table);
    register_chat(table);
}

/// Chat builtins: `llSay` and `llOwnerSay`
fn register_chat(table: &mut LibraryTable) {
    table.register("llSay", Signature::new(VOID, &[INT, STR]), |ctx, args| {
        let channel = int_arg(args, 0)?;
        let text = str_arg(args, 1)?;
        ctx.services.chat.say(ctx.object_id, channel, text);
        Ok(Value::Integer(0))
    });
    table.register("llOwnerSay", Signature::new(VOID, &[STR]), |ctx, args| {
        ctx.services.chat.say(ctx.object_id, 0, str_arg(args, 0)?);
        Ok(Value::Integer(0))
    });
}

/// Inclusive index range using LSL's sub-range rules
///
/// Negative indices count from the end and are normalized once. When
/// `start <= end` the span covers `start..=end`. Otherwise it is an
/// exclusion: everything up to `end` plus everything from `start` on, which
/// drops the middle. Indices outside `0..len` simply match nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    start: i64,
    end: i64,
}

impl Span {
    pub(crate) fn new(len: usize, start: i32, end: i32) -> Self {
        let len = len as i64;
        let normalize = |i: i32| {
            let i = i as i64;
            if i < 0 {
                i + len
            } else {
                i
            }
        };
        Self {
            start: normalize(start),
            end: normalize(end),
        }
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        let i = index as i64;
        if self.start <= self.end {
            i >= self.start && i <= self.end
        } else {
            i <= self.end || i >= self.start
        }
    }
}

// ============================================================================
// Argument accessors
// ============================================================================

fn arg(args: &[Value], i: usize) -> Result<&Value, LibraryError> {
    args.get(i).ok_or_else(|| LibraryError::Failed(format!("missing argument {i}")))
}

fn mismatch(i: usize, expected: ValueType, found: &Value) -> LibraryError {
    LibraryError::TypeMismatch {
        position: i,
        expected,
        found: found.value_type(),
    }
}

pub(crate) fn int_arg(args: &[Value], i: usize) -> Result<i32, LibraryError> {
    let v = arg(args, i)?;
    v.as_integer().ok_or_else(|| mismatch(i, INT, v))
}

pub(crate) fn float_arg(args: &[Value], i: usize) -> Result<f32, LibraryError> {
    let v = arg(args, i)?;
    v.as_float().ok_or_else(|| mismatch(i, FLOAT, v))
}

/// Text of a string or key argument
pub(crate) fn str_arg(args: &[Value], i: usize) -> Result<&str, LibraryError> {
    let v = arg(args, i)?;
    v.as_str().ok_or_else(|| mismatch(i, STR, v))
}

pub(crate) fn vec_arg(args: &[Value], i: usize) -> Result<Vector, LibraryError> {
    let v = arg(args, i)?;
    v.as_vector().ok_or_else(|| mismatch(i, VEC, v))
}

pub(crate) fn rot_arg(args: &[Value], i: usize) -> Result<Quaternion, LibraryError> {
    let v = arg(args, i)?;
    v.as_rotation().ok_or_else(|| mismatch(i, ROT, v))
}

pub(crate) fn list_arg(args: &[Value], i: usize) -> Result<&[Value], LibraryError> {
    let v = arg(args, i)?;
    v.as_list().ok_or_else(|| mismatch(i, LIST, v))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for builtin unit tests

    use super::*;
    use crate::library::HostServices;
    use uuid::Uuid;

    /// Call a builtin from a fresh table with deterministic services
    pub fn call(name: &str, args: &[Value]) -> Value {
        call_with(&HostServices::default(), name, args)
    }

    /// Call a builtin with the given services
    pub fn call_with(services: &HostServices, name: &str, args: &[Value]) -> Value {
        let table = LibraryTable::with_builtins();
        let ctx = CallContext {
            object_id: Uuid::nil(),
            services,
        };
        table
            .call(name, &ctx, args)
            .unwrap_or_else(|e| panic!("{name} failed: {e}"))
    }

    pub fn s(text: &str) -> Value {
        Value::string(text)
    }

    pub fn i(v: i32) -> Value {
        Value::Integer(v)
    }

    pub fn f(v: f32) -> Value {
        Value::Float(v)
    }
}

//! String builtins
//!
//! Positions count characters, not bytes.

use super::{int_arg, str_arg, Span, INT, STR};
use crate::library::{LibraryTable, Signature};
use crate::value::Value;

/// `STRING_TRIM_HEAD`
pub const STRING_TRIM_HEAD: i32 = 0x01;
/// `STRING_TRIM_TAIL`
pub const STRING_TRIM_TAIL: i32 = 0x02;

/// `llGetSubString`
pub fn get_sub_string(src: &str, start: i32, end: i32) -> String {
    let span = Span::new(src.chars().count(), start, end);
    src.chars()
        .enumerate()
        .filter(|(i, _)| span.contains(*i))
        .map(|(_, c)| c)
        .collect()
}

/// `llDeleteSubString`: everything [`get_sub_string`] would not return
pub fn delete_sub_string(src: &str, start: i32, end: i32) -> String {
    let span = Span::new(src.chars().count(), start, end);
    src.chars()
        .enumerate()
        .filter(|(i, _)| !span.contains(*i))
        .map(|(_, c)| c)
        .collect()
}

/// `llInsertString`, with the position clamped into the string
pub fn insert_string(dst: &str, pos: i32, src: &str) -> String {
    let len = dst.chars().count();
    let pos = (pos.max(0) as usize).min(len);
    let split = dst.char_indices().nth(pos).map_or(dst.len(), |(b, _)| b);
    let mut out = String::with_capacity(dst.len() + src.len());
    out.push_str(&dst[..split]);
    out.push_str(src);
    out.push_str(&dst[split..]);
    out
}

/// `llSubStringIndex`: character index of the first match, or -1
pub fn sub_string_index(src: &str, pattern: &str) -> i32 {
    match src.find(pattern) {
        Some(byte) => src[..byte].chars().count() as i32,
        None => -1,
    }
}

pub(super) fn register(table: &mut LibraryTable) {
    table.register("llGetSubString", Signature::new(STR, &[STR, INT, INT]), |_ctx, args| {
        Ok(Value::String(get_sub_string(
            str_arg(args, 0)?,
            int_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
    table.register("llDeleteSubString", Signature::new(STR, &[STR, INT, INT]), |_ctx, args| {
        Ok(Value::String(delete_sub_string(
            str_arg(args, 0)?,
            int_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
    table.register("llInsertString", Signature::new(STR, &[STR, INT, STR]), |_ctx, args| {
        Ok(Value::String(insert_string(
            str_arg(args, 0)?,
            int_arg(args, 1)?,
            str_arg(args, 2)?,
        )))
    });
    table.register("llToUpper", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(str_arg(args, 0)?.to_uppercase()))
    });
    table.register("llToLower", Signature::new(STR, &[STR]), |_ctx, args| {
        Ok(Value::String(str_arg(args, 0)?.to_lowercase()))
    });
    table.register("llStringLength", Signature::new(INT, &[STR]), |_ctx, args| {
        Ok(Value::Integer(str_arg(args, 0)?.chars().count() as i32))
    });
    table.register("llSubStringIndex", Signature::new(INT, &[STR, STR]), |_ctx, args| {
        Ok(Value::Integer(sub_string_index(
            str_arg(args, 0)?,
            str_arg(args, 1)?,
        )))
    });
    table.register("llStringTrim", Signature::new(STR, &[STR, INT]), |_ctx, args| {
        let src = str_arg(args, 0)?;
        let mode = int_arg(args, 1)?;
        let mut out = src;
        if mode & STRING_TRIM_HEAD != 0 {
            out = out.trim_start();
        }
        if mode & STRING_TRIM_TAIL != 0 {
            out = out.trim_end();
        }
        Ok(Value::string(out))
    });
}

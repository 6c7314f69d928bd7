//! List builtins
//!
//! Element accessors normalize negative positions (`pos < 0` becomes
//! `pos + length`) and return the type's default for anything still out of
//! range, never a fault.

use super::{int_arg, list_arg, str_arg, Span, INT, KEY, LIST, STR, FLOAT, VEC, ROT};
use crate::library::{LibraryTable, RandomSource, Signature};
use crate::math::{Quaternion, Vector};
use crate::value::Value;
use lso_bytecode::ValueType;

/// Element at a signed position, if in range
pub fn list_entry(list: &[Value], pos: i32) -> Option<&Value> {
    let pos = if pos < 0 { pos as i64 + list.len() as i64 } else { pos as i64 };
    if pos < 0 {
        None
    } else {
        list.get(pos as usize)
    }
}

/// `llList2List`: same range rules as `llGetSubString`
pub fn list_slice(list: &[Value], start: i32, end: i32) -> Vec<Value> {
    let span = Span::new(list.len(), start, end);
    list.iter()
        .enumerate()
        .filter(|(i, _)| span.contains(*i))
        .map(|(_, v)| v.clone())
        .collect()
}

/// `llDeleteSubList`: everything [`list_slice`] would not return
pub fn list_delete(list: &[Value], start: i32, end: i32) -> Vec<Value> {
    let span = Span::new(list.len(), start, end);
    list.iter()
        .enumerate()
        .filter(|(i, _)| !span.contains(*i))
        .map(|(_, v)| v.clone())
        .collect()
}

/// `llListInsertList`
pub fn list_insert(dest: &[Value], src: &[Value], pos: i32) -> Vec<Value> {
    let len = dest.len() as i64;
    let mut pos = pos as i64;
    if pos < 0 {
        pos += len;
    }
    let at = pos.clamp(0, len) as usize;
    let mut out = Vec::with_capacity(dest.len() + src.len());
    out.extend_from_slice(&dest[..at]);
    out.extend_from_slice(src);
    out.extend_from_slice(&dest[at..]);
    out
}

/// `llListFindList`: index of the first occurrence of `test`, or -1
///
/// Elements match only if both type and value are equal. An empty `test`
/// matches at 0.
pub fn list_find(src: &[Value], test: &[Value]) -> i32 {
    if test.is_empty() {
        return 0;
    }
    src.windows(test.len())
        .position(|w| w == test)
        .map_or(-1, |i| i as i32)
}

/// `llParseString2List`
///
/// Separators are dropped and spacers kept as tokens. At each position the
/// separators are tried first, in order, then the spacers. Empty tokens are
/// discarded.
pub fn parse_string(src: &str, separators: &[String], spacers: &[String]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut token_start = 0;
    let mut i = 0;

    while i < src.len() {
        let rest = &src[i..];
        let sep = separators.iter().find(|s| !s.is_empty() && rest.starts_with(s.as_str()));
        let spacer = if sep.is_none() {
            spacers.iter().find(|s| !s.is_empty() && rest.starts_with(s.as_str()))
        } else {
            None
        };

        match (sep, spacer) {
            (Some(matched), _) | (None, Some(matched)) => {
                if i > token_start {
                    out.push(Value::string(&src[token_start..i]));
                }
                if spacer.is_some() {
                    out.push(Value::string(matched.as_str()));
                }
                i += matched.len();
                token_start = i;
            }
            (None, None) => {
                i += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    if token_start < src.len() {
        out.push(Value::string(&src[token_start..]));
    }
    out
}

/// `llListRandomize`: shuffle `stride`-sized blocks
///
/// A stride that does not divide the length leaves the list unchanged.
pub fn list_randomize(list: &[Value], stride: i32, random: &dyn RandomSource) -> Vec<Value> {
    let stride = stride.max(1) as usize;
    if list.is_empty() || list.len() % stride != 0 {
        return list.to_vec();
    }
    let mut chunks: Vec<&[Value]> = list.chunks(stride).collect();
    for i in (1..chunks.len()).rev() {
        let j = random.next_below(i + 1);
        chunks.swap(i, j);
    }
    chunks.concat()
}

fn join(list: &[Value], separator: &str) -> String {
    list.iter()
        .map(Value::to_list_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn strings_of(list: &[Value]) -> Vec<String> {
    list.iter().map(Value::to_list_string).collect()
}

pub(super) fn register(table: &mut LibraryTable) {
    table.register("llGetListLength", Signature::new(INT, &[LIST]), |_ctx, args| {
        Ok(Value::Integer(list_arg(args, 0)?.len() as i32))
    });

    table.register("llList2Integer", Signature::new(INT, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(entry
            .and_then(|v| v.cast(ValueType::Integer))
            .unwrap_or(Value::Integer(0)))
    });
    table.register("llList2Float", Signature::new(FLOAT, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(entry
            .and_then(|v| v.cast(ValueType::Float))
            .unwrap_or(Value::Float(0.0)))
    });
    table.register("llList2String", Signature::new(STR, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(Value::String(entry.map(Value::to_list_string).unwrap_or_default()))
    });
    table.register("llList2Key", Signature::new(KEY, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(Value::Key(entry.map(Value::to_string).unwrap_or_default()))
    });
    table.register("llList2Vector", Signature::new(VEC, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(match entry {
            Some(v @ (Value::Vector(_) | Value::String(_))) => {
                v.cast(ValueType::Vector).unwrap_or(Value::Vector(Vector::ZERO))
            }
            _ => Value::Vector(Vector::ZERO),
        })
    });
    table.register("llList2Rot", Signature::new(ROT, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(match entry {
            Some(v @ (Value::Rotation(_) | Value::String(_))) => v
                .cast(ValueType::Rotation)
                .unwrap_or(Value::Rotation(Quaternion::IDENTITY)),
            _ => Value::Rotation(Quaternion::IDENTITY),
        })
    });
    table.register("llGetListEntryType", Signature::new(INT, &[LIST, INT]), |_ctx, args| {
        let entry = list_entry(list_arg(args, 0)?, int_arg(args, 1)?);
        Ok(Value::Integer(
            entry.map_or(ValueType::Void, Value::value_type).to_u8() as i32,
        ))
    });

    table.register("llList2List", Signature::new(LIST, &[LIST, INT, INT]), |_ctx, args| {
        Ok(Value::List(list_slice(
            list_arg(args, 0)?,
            int_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
    table.register("llDeleteSubList", Signature::new(LIST, &[LIST, INT, INT]), |_ctx, args| {
        Ok(Value::List(list_delete(
            list_arg(args, 0)?,
            int_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
    table.register("llListInsertList", Signature::new(LIST, &[LIST, LIST, INT]), |_ctx, args| {
        Ok(Value::List(list_insert(
            list_arg(args, 0)?,
            list_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
    table.register("llListFindList", Signature::new(INT, &[LIST, LIST]), |_ctx, args| {
        Ok(Value::Integer(list_find(list_arg(args, 0)?, list_arg(args, 1)?)))
    });

    table.register("llList2CSV", Signature::new(STR, &[LIST]), |_ctx, args| {
        Ok(Value::String(join(list_arg(args, 0)?, ", ")))
    });
    table.register("llDumpList2String", Signature::new(STR, &[LIST, STR]), |_ctx, args| {
        Ok(Value::String(join(list_arg(args, 0)?, str_arg(args, 1)?)))
    });
    table.register("llParseString2List", Signature::new(LIST, &[STR, LIST, LIST]), |_ctx, args| {
        let separators = strings_of(list_arg(args, 1)?);
        let spacers = strings_of(list_arg(args, 2)?);
        Ok(Value::List(parse_string(str_arg(args, 0)?, &separators, &spacers)))
    });
    table.register("llListRandomize", Signature::new(LIST, &[LIST, INT]), |ctx, args| {
        Ok(Value::List(list_randomize(
            list_arg(args, 0)?,
            int_arg(args, 1)?,
            ctx.services.random.as_ref(),
        )))
    });
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::library::SeededRandom;

    fn sample() -> Value {
        Value::List(vec![
            i(7),
            f(2.5),
            s("text"),
            Value::key("a2e76fcd-9360-4f6d-a924-000000000003"),
            Value::Vector(Vector::new(1.0, 2.0, 3.0)),
            Value::Rotation(Quaternion::new(0.0, 0.0, 1.0, 0.0)),
        ])
    }

    #[test]
    fn test_entries_round_trip() {
        let list = sample();
        assert_eq!(call("llList2Integer", &[list.clone(), i(0)]), i(7));
        assert_eq!(call("llList2Float", &[list.clone(), i(1)]), f(2.5));
        assert_eq!(call("llList2String", &[list.clone(), i(2)]), s("text"));
        assert_eq!(
            call("llList2Key", &[list.clone(), i(3)]),
            Value::key("a2e76fcd-9360-4f6d-a924-000000000003")
        );
        assert_eq!(
            call("llList2Vector", &[list.clone(), i(4)]),
            Value::Vector(Vector::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            call("llList2Rot", &[list.clone(), i(-1)]),
            Value::Rotation(Quaternion::new(0.0, 0.0, 1.0, 0.0))
        );
    }

    #[test]
    fn test_out_of_range_yields_defaults() {
        let list = sample();
        assert_eq!(call("llList2Integer", &[list.clone(), i(6)]), i(0));
        assert_eq!(call("llList2Float", &[list.clone(), i(-7)]), f(0.0));
        assert_eq!(call("llList2String", &[list.clone(), i(100)]), s(""));
        assert_eq!(call("llList2Key", &[list.clone(), i(100)]), Value::key(""));
        assert_eq!(
            call("llList2Vector", &[list.clone(), i(100)]),
            Value::Vector(Vector::ZERO)
        );
        assert_eq!(
            call("llList2Rot", &[list.clone(), i(100)]),
            Value::Rotation(Quaternion::IDENTITY)
        );
        assert_eq!(call("llGetListEntryType", &[list, i(6)]), i(0));
    }

    #[test]
    fn test_entry_conversions() {
        let list = Value::List(vec![s("42abc"), f(3.9), s("<1,2,3>"), i(5)]);
        assert_eq!(call("llList2Integer", &[list.clone(), i(0)]), i(42));
        assert_eq!(call("llList2Integer", &[list.clone(), i(1)]), i(3));
        assert_eq!(call("llList2String", &[list.clone(), i(1)]), s("3.900000"));
        assert_eq!(
            call("llList2Vector", &[list.clone(), i(2)]),
            Value::Vector(Vector::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            call("llList2Vector", &[list.clone(), i(3)]),
            Value::Vector(Vector::ZERO)
        );
        assert_eq!(call("llGetListEntryType", &[list, i(-1)]), i(1));
    }

    #[test]
    fn test_slices() {
        let list: Vec<Value> = (0..6).map(i).collect();
        assert_eq!(list_slice(&list, 1, 2), vec![i(1), i(2)]);
        assert_eq!(list_slice(&list, 4, 1), vec![i(0), i(1), i(4), i(5)]);
        assert_eq!(list_delete(&list, 1, -2), vec![i(0), i(5)]);
        assert_eq!(list_insert(&list[..2], &[s("x")], -1), vec![i(0), s("x"), i(1)]);
        assert_eq!(list_insert(&list[..2], &[s("x")], 9), vec![i(0), i(1), s("x")]);
    }

    #[test]
    fn test_find() {
        let list = vec![i(1), s("a"), i(2), s("a"), i(3)];
        assert_eq!(list_find(&list, &[s("a"), i(3)]), 3);
        assert_eq!(list_find(&list, &[s("b")]), -1);
        assert_eq!(list_find(&list, &[]), 0);
        // Type matters
        assert_eq!(list_find(&[f(1.0)], &[i(1)]), -1);
    }

    #[test]
    fn test_csv_and_dump() {
        let list = Value::List(vec![i(1), f(0.5), s("x")]);
        assert_eq!(call("llList2CSV", &[list.clone()]), s("1, 0.500000, x"));
        assert_eq!(call("llDumpList2String", &[list, s("|")]), s("1|0.500000|x"));
    }

    #[test]
    fn test_list_strings_use_six_decimals() {
        let list = Value::List(vec![
            Value::Vector(Vector::new(1.0, 2.5, -3.0)),
            Value::Rotation(Quaternion::IDENTITY),
        ]);
        assert_eq!(
            call("llList2CSV", &[list.clone()]),
            s("<1.000000, 2.500000, -3.000000>, <0.000000, 0.000000, 0.000000, 1.000000>")
        );
        assert_eq!(
            call("llDumpList2String", &[list.clone(), s("|")]),
            s("<1.000000, 2.500000, -3.000000>|<0.000000, 0.000000, 0.000000, 1.000000>")
        );
        assert_eq!(
            call("llList2String", &[list, i(0)]),
            s("<1.000000, 2.500000, -3.000000>")
        );
    }

    #[test]
    fn test_parse_string() {
        let out = parse_string("a,b;;c", &[",".into(), ";".into()], &[]);
        assert_eq!(out, vec![s("a"), s("b"), s("c")]);

        let out = parse_string("1+2=3", &[], &["+".into(), "=".into()]);
        assert_eq!(out, vec![s("1"), s("+"), s("2"), s("="), s("3")]);

        let out = call(
            "llParseString2List",
            &[
                s("x y"),
                Value::List(vec![s(" ")]),
                Value::List(vec![]),
            ],
        );
        assert_eq!(out, Value::List(vec![s("x"), s("y")]));
    }

    #[test]
    fn test_randomize_keeps_strides() {
        let list: Vec<Value> = (0..8).map(i).collect();
        let random = SeededRandom::new(3);
        let out = list_randomize(&list, 2, &random);
        assert_eq!(out.len(), 8);
        for pair in out.chunks(2) {
            let first = pair[0].as_integer().unwrap();
            assert_eq!(first % 2, 0);
            assert_eq!(pair[1], i(first + 1));
        }
        // Stride must divide the length
        assert_eq!(list_randomize(&list, 3, &random), list);
    }
}

//! String conversions with LSL's formatting and parsing rules

use crate::math::{Quaternion, Vector};

/// Format a float the way `(string)f` does: six decimals
pub fn format_float(value: f32) -> String {
    format_float_with(value, 6)
}

fn format_float_with(value: f32, decimals: usize) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// Format a vector as `<x, y, z>` with five decimals
pub fn format_vector(v: Vector) -> String {
    format_vector_with(v, 5)
}

/// Format a rotation as `<x, y, z, s>` with five decimals
pub fn format_rotation(q: Quaternion) -> String {
    format_rotation_with(q, 5)
}

/// Vector formatting with a chosen precision; list conversions use six
pub fn format_vector_with(v: Vector, decimals: usize) -> String {
    format!(
        "<{}, {}, {}>",
        format_float_with(v.x, decimals),
        format_float_with(v.y, decimals),
        format_float_with(v.z, decimals)
    )
}

/// Rotation formatting with a chosen precision
pub fn format_rotation_with(q: Quaternion, decimals: usize) -> String {
    format!(
        "<{}, {}, {}, {}>",
        format_float_with(q.x, decimals),
        format_float_with(q.y, decimals),
        format_float_with(q.z, decimals),
        format_float_with(q.s, decimals)
    )
}

/// Parse the leading integer of a string, `(integer)"..."` style
///
/// Leading whitespace and a sign are accepted, `0x` switches to hex, and
/// parsing stops at the first character that is not a digit. A string with
/// no digits yields 0. Values wrap to 32 bits.
pub fn parse_int_prefix(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };

    let mut acc: i64 = 0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => acc = acc.wrapping_mul(radix as i64).wrapping_add(d as i64),
            None => break,
        }
    }
    let value = acc as i32;
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Parse the leading float of a string, `(float)"..."` style
pub fn parse_float_prefix(s: &str) -> f32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        let frac_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        digits += end - frac_start;
    }
    if digits == 0 {
        return 0.0;
    }
    // Exponent only counts if it has digits
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f32>().unwrap_or(0.0)
}

fn parse_components<const N: usize>(s: &str) -> Option<[f32; N]> {
    let inner = s.trim_start().strip_prefix('<')?;
    let mut parts = inner.splitn(N, ',');
    let mut out = [0.0f32; N];
    for slot in out.iter_mut() {
        let part = parts.next()?;
        let trimmed = part.trim_start();
        // Each component must start like a number
        match trimmed.chars().next() {
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {}
            _ => return None,
        }
        *slot = parse_float_prefix(trimmed);
    }
    Some(out)
}

/// Parse `<x, y, z>`; malformed input yields `None`
pub fn parse_vector(s: &str) -> Option<Vector> {
    parse_components::<3>(s).map(Vector::from_array)
}

/// Parse `<x, y, z, s>`; malformed input yields `None`
pub fn parse_rotation(s: &str) -> Option<Quaternion> {
    parse_components::<4>(s).map(Quaternion::from_array)
}

/// Whether a key string names a valid, non-null UUID
pub fn is_valid_key(s: &str) -> bool {
    uuid::Uuid::parse_str(s)
        .map(|id| !id.is_nil())
        .unwrap_or(false)
}

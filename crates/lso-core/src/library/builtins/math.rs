//! Numeric builtins
//!
//! Float functions compute in `f64` and narrow the result, so they round the
//! same way the host's double-precision libm does.

use super::{float_arg, int_arg, FLOAT, INT};
use crate::library::{LibraryTable, Signature};
use crate::value::{float_to_int, Value};

fn unary_float(table: &mut LibraryTable, name: &str, op: fn(f64) -> f64) {
    table.register(name, Signature::new(FLOAT, &[FLOAT]), move |_ctx, args| {
        Ok(Value::Float(op(float_arg(args, 0)? as f64) as f32))
    });
}

fn float_to_int_fn(table: &mut LibraryTable, name: &str, op: fn(f64) -> f64) {
    table.register(name, Signature::new(INT, &[FLOAT]), move |_ctx, args| {
        Ok(Value::Integer(float_to_int(op(float_arg(args, 0)? as f64) as f32)))
    });
}

pub(super) fn register(table: &mut LibraryTable) {
    unary_float(table, "llSin", f64::sin);
    unary_float(table, "llCos", f64::cos);
    unary_float(table, "llTan", f64::tan);
    unary_float(table, "llSqrt", f64::sqrt);
    unary_float(table, "llFabs", f64::abs);
    unary_float(table, "llAcos", f64::acos);
    unary_float(table, "llAsin", f64::asin);
    // Non-positive input yields 0.0 rather than -inf/NaN
    unary_float(table, "llLog", |x| if x > 0.0 { x.ln() } else { 0.0 });
    unary_float(table, "llLog10", |x| if x > 0.0 { x.log10() } else { 0.0 });

    table.register("llAtan2", Signature::new(FLOAT, &[FLOAT, FLOAT]), |_ctx, args| {
        let y = float_arg(args, 0)? as f64;
        let x = float_arg(args, 1)? as f64;
        Ok(Value::Float(y.atan2(x) as f32))
    });

    table.register("llPow", Signature::new(FLOAT, &[FLOAT, FLOAT]), |_ctx, args| {
        let base = float_arg(args, 0)? as f64;
        let exponent = float_arg(args, 1)? as f64;
        Ok(Value::Float(base.powf(exponent) as f32))
    });

    table.register("llAbs", Signature::new(INT, &[INT]), |_ctx, args| {
        Ok(Value::Integer(int_arg(args, 0)?.wrapping_abs()))
    });

    table.register("llFrand", Signature::new(FLOAT, &[FLOAT]), |ctx, args| {
        let mag = float_arg(args, 0)? as f64;
        Ok(Value::Float((mag * ctx.services.random.next_unit()) as f32))
    });

    float_to_int_fn(table, "llFloor", f64::floor);
    float_to_int_fn(table, "llCeil", f64::ceil);
    float_to_int_fn(table, "llRound", |x| (x + 0.5).floor());

    table.register("llModPow", Signature::new(INT, &[INT, INT, INT]), |_ctx, args| {
        Ok(Value::Integer(mod_pow(
            int_arg(args, 0)?,
            int_arg(args, 1)?,
            int_arg(args, 2)?,
        )))
    });
}

/// Modular exponentiation by repeated squaring with a 64-bit accumulator
///
/// A non-positive modulus yields 0 and a non-positive exponent yields 1.
/// Negative bases are reduced into `[0, modulus)` first.
pub fn mod_pow(base: i32, exponent: i32, modulus: i32) -> i32 {
    if modulus <= 0 {
        return 0;
    }
    let modulus = modulus as u64;
    let mut base = (base as i64).rem_euclid(modulus as i64) as u64;
    let mut exponent = exponent;
    let mut result: u64 = 1;

    while exponent > 0 {
        if exponent % 2 == 1 {
            result = (result * base) % modulus;
        }
        exponent >>= 1;
        base = (base * base) % modulus;
    }
    result as i32
}

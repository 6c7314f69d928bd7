//! Clock builtins
//!
//! All readings come from the host [`Clock`](crate::library::Clock), so a
//! fixed clock makes them reproducible.

use super::{FLOAT, INT, STR};
use crate::library::{LibraryTable, Signature};
use crate::value::Value;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::America::Los_Angeles;

/// Seconds since midnight, US Pacific time
pub fn pacific_seconds_since_midnight(utc: DateTime<Utc>) -> u32 {
    utc.with_timezone(&Los_Angeles).num_seconds_from_midnight()
}

pub(super) fn register(table: &mut LibraryTable) {
    table.register("llGetWallclock", Signature::new(FLOAT, &[]), |ctx, _args| {
        let now = ctx.services.clock.now();
        Ok(Value::Float(pacific_seconds_since_midnight(now) as f32))
    });
    table.register("llGetGMTclock", Signature::new(FLOAT, &[]), |ctx, _args| {
        let now = ctx.services.clock.now();
        Ok(Value::Float(now.num_seconds_from_midnight() as f32))
    });
    table.register("llGetDate", Signature::new(STR, &[]), |ctx, _args| {
        let now = ctx.services.clock.now();
        Ok(Value::String(now.format("%Y-%m-%d").to_string()))
    });
    table.register("llGetTimestamp", Signature::new(STR, &[]), |ctx, _args| {
        let now = ctx.services.clock.now();
        Ok(Value::String(now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()))
    });
    table.register("llGetUnixTime", Signature::new(INT, &[]), |ctx, _args| {
        Ok(Value::Integer(ctx.services.clock.now().timestamp() as i32))
    });
}

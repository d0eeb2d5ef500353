//! Value coercion applied to outgoing parameters and incoming column values.
//!
//! Both directions are total: a value that cannot be converted becomes
//! [`RowValues::Null`] instead of producing an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::results::Column;
use crate::types::{RowValues, SqlType};

/// Parser applied to values of a named user-defined type.
pub type UdtParser = Arc<dyn Fn(RowValues) -> RowValues + Send + Sync>;

/// Registry of per-UDT-name value parsers used by [`value_correction`].
#[derive(Clone, Default)]
pub struct UdtParsers {
    parsers: HashMap<String, UdtParser>,
}

impl UdtParsers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the parser for `udt_name`. Lookup is case-insensitive.
    pub fn register<F>(&mut self, udt_name: &str, parser: F)
    where
        F: Fn(RowValues) -> RowValues + Send + Sync + 'static,
    {
        self.parsers
            .insert(udt_name.to_ascii_lowercase(), Arc::new(parser));
    }

    #[must_use]
    pub fn with<F>(mut self, udt_name: &str, parser: F) -> Self
    where
        F: Fn(RowValues) -> RowValues + Send + Sync + 'static,
    {
        self.register(udt_name, parser);
        self
    }

    #[must_use]
    pub fn get(&self, udt_name: &str) -> Option<&UdtParser> {
        self.parsers.get(&udt_name.to_ascii_lowercase())
    }
}

impl fmt::Debug for UdtParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.parsers.keys().collect();
        names.sort();
        f.debug_struct("UdtParsers").field("parsers", &names).finish()
    }
}

/// Coerce an input parameter value to what the binding for `ty` can carry.
#[must_use]
pub fn cast_parameter(value: RowValues, ty: SqlType) -> RowValues {
    if value.is_null() {
        // The binding has no null representation for binary types.
        return if ty.is_binary() {
            RowValues::Blob(Vec::new())
        } else {
            RowValues::Null
        };
    }

    if ty.is_string() {
        return match value {
            RowValues::Text(_) => value,
            other => RowValues::Text(other.to_string()),
        };
    }
    if ty.is_integer() {
        return cast_integer(value);
    }
    if ty.is_float() {
        return cast_float(value);
    }
    if ty == SqlType::Bit {
        return RowValues::Bool(is_truthy(&value));
    }
    if ty.is_temporal() {
        return cast_timestamp(value);
    }
    if ty.is_binary() {
        return match value {
            RowValues::Blob(_) => value,
            other => RowValues::Blob(other.to_string().into_bytes()),
        };
    }
    value
}

fn cast_integer(value: RowValues) -> RowValues {
    match value {
        RowValues::Int(_) => value,
        RowValues::Float(x) if x.is_finite() => RowValues::Int(x.trunc() as i64),
        RowValues::Text(s) => parse_leading_int(&s).map_or(RowValues::Null, RowValues::Int),
        RowValues::JSON(JsonValue::Number(n)) => cast_integer(RowValues::from_json(JsonValue::Number(n))),
        RowValues::JSON(JsonValue::String(s)) => {
            parse_leading_int(&s).map_or(RowValues::Null, RowValues::Int)
        }
        RowValues::Blob(bytes) => {
            parse_leading_int(&String::from_utf8_lossy(&bytes)).map_or(RowValues::Null, RowValues::Int)
        }
        _ => RowValues::Null,
    }
}

fn cast_float(value: RowValues) -> RowValues {
    match value {
        RowValues::Float(x) if x.is_nan() => RowValues::Null,
        RowValues::Float(_) => value,
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => RowValues::Float(i as f64),
        RowValues::Text(s) => parse_leading_float(&s).map_or(RowValues::Null, RowValues::Float),
        RowValues::JSON(JsonValue::Number(n)) => n.as_f64().map_or(RowValues::Null, RowValues::Float),
        RowValues::JSON(JsonValue::String(s)) => {
            parse_leading_float(&s).map_or(RowValues::Null, RowValues::Float)
        }
        RowValues::Blob(bytes) => parse_leading_float(&String::from_utf8_lossy(&bytes))
            .map_or(RowValues::Null, RowValues::Float),
        _ => RowValues::Null,
    }
}

fn cast_timestamp(value: RowValues) -> RowValues {
    match value {
        RowValues::Timestamp(_) => value,
        RowValues::Int(ms) => from_epoch_millis(ms),
        RowValues::Float(ms) if ms.is_finite() => from_epoch_millis(ms.trunc() as i64),
        RowValues::Text(s) | RowValues::JSON(JsonValue::String(s)) => {
            parse_timestamp(&s).map_or(RowValues::Null, RowValues::Timestamp)
        }
        _ => RowValues::Null,
    }
}

fn from_epoch_millis(ms: i64) -> RowValues {
    DateTime::from_timestamp_millis(ms).map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc()))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn is_truthy(value: &RowValues) -> bool {
    match value {
        RowValues::Null => false,
        RowValues::Bool(b) => *b,
        RowValues::Int(i) => *i != 0,
        RowValues::Float(x) => *x != 0.0 && !x.is_nan(),
        RowValues::Text(s) => !s.is_empty(),
        RowValues::JSON(json) => match json {
            JsonValue::Null => false,
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
            JsonValue::String(s) => !s.is_empty(),
            JsonValue::Array(_) | JsonValue::Object(_) => true,
        },
        RowValues::Timestamp(_) | RowValues::Blob(_) => true,
    }
}

/// Integer prefix of `s`: optional sign followed by digits; trailing garbage is ignored.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

/// Float prefix of `s`: sign, digits, optional fraction and exponent.
fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut mantissa_digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        mantissa_digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
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
    s[..end].parse().ok()
}

/// Fix up a value read from `column` before it is stored on a row.
#[must_use]
pub fn value_correction(value: RowValues, column: &Column, udt_parsers: &UdtParsers) -> RowValues {
    if value.is_null() {
        return value;
    }
    match column.sql_type {
        SqlType::Time => match value {
            // Only the time of day is meaningful for a time column.
            RowValues::Timestamp(dt) => match NaiveDate::from_ymd_opt(1970, 1, 1) {
                Some(epoch) => RowValues::Timestamp(epoch.and_time(dt.time())),
                None => RowValues::Timestamp(dt),
            },
            other => other,
        },
        SqlType::Udt => match column.udt_name.as_deref().and_then(|n| udt_parsers.get(n)) {
            Some(parser) => parser(value),
            None => value,
        },
        _ => value,
    }
}

//! JSON <-> SQL coercion keyed by column kind.
//!
//! Input side rejects anything that cannot be represented in the column instead of truncating it.
//! Output side is total: whatever the driver hands back becomes some JSON value.

use crate::error::AppError;
use crate::schema::{ColumnKind, ColumnModel};
use crate::sql::{Dialect, SqlValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use thiserror::Error;

/// Output format for datetime columns. Fractional seconds are printed only when present.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_INPUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

#[derive(Error, Debug, PartialEq)]
#[error("cannot store {found} in a {kind:?} column")]
pub struct CoercionError {
    pub kind: ColumnKind,
    pub found: String,
}

impl From<CoercionError> for AppError {
    fn from(e: CoercionError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

fn reject(kind: ColumnKind, v: &Value) -> CoercionError {
    let found = match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    };
    CoercionError { kind, found }
}

/// JSON value from a request body or query string -> bindable value.
pub fn to_sql(v: &Value, kind: ColumnKind) -> Result<SqlValue, CoercionError> {
    if v.is_null() {
        return Ok(SqlValue::Null);
    }
    let bad = || reject(kind, v);
    Ok(match kind {
        ColumnKind::Integer => match v {
            Value::Number(n) => SqlValue::Integer(integer_from_number(n).ok_or_else(bad)?),
            Value::String(s) => SqlValue::Integer(s.trim().parse::<i64>().map_err(|_| bad())?),
            _ => return Err(bad()),
        },
        ColumnKind::Real => match v {
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Numeric(n.to_string()),
            },
            Value::String(s) => {
                let s = s.trim();
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => match s.parse::<i64>() {
                        Ok(i) => SqlValue::Integer(i),
                        Err(_) => SqlValue::Numeric(s.to_string()),
                    },
                    _ => return Err(bad()),
                }
            }
            _ => return Err(bad()),
        },
        ColumnKind::Boolean => match v {
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => SqlValue::Bool(false),
                Some(1) => SqlValue::Bool(true),
                _ => return Err(bad()),
            },
            Value::String(s) => SqlValue::Bool(parse_bool(s).ok_or_else(bad)?),
            _ => return Err(bad()),
        },
        ColumnKind::DateTime => match v {
            Value::String(s) => SqlValue::Text(parse_datetime(s).ok_or_else(bad)?.format(DATETIME_FORMAT).to_string()),
            _ => return Err(bad()),
        },
        ColumnKind::Text => match v {
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Number(n) => SqlValue::Text(n.to_string()),
            Value::Bool(b) => SqlValue::Text(b.to_string()),
            _ => return Err(bad()),
        },
        // A string is taken as already-encoded JSON and stored verbatim.
        ColumnKind::Json => match v {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
    })
}

/// [`to_sql`] against a concrete column: narrow integer columns are range-checked, JSON text must
/// parse where the database parses it, and zone-aware timestamps are bound with a `+00` offset.
pub fn column_to_sql(v: &Value, column: &ColumnModel, dialect: Dialect) -> Result<SqlValue, CoercionError> {
    let out = to_sql(v, column.kind)?;
    match (&out, column.kind) {
        (SqlValue::Integer(n), ColumnKind::Integer) => {
            if let Some((lo, hi)) = dialect.integer_range(&column.declared_type) {
                if *n < lo || *n > hi {
                    return Err(reject(column.kind, v));
                }
            }
        }
        (SqlValue::Text(s), ColumnKind::Json) if dialect.parses_json() => {
            if serde_json::from_str::<serde::de::IgnoredAny>(s).is_err() {
                return Err(reject(column.kind, v));
            }
        }
        (SqlValue::Text(s), ColumnKind::DateTime) if dialect.zoned_datetime(&column.declared_type) => {
            return Ok(SqlValue::Text(format!("{}+00", s)));
        }
        _ => {}
    }
    Ok(out)
}

/// Raw text from a path segment or query string -> bindable value.
pub fn text_to_sql(raw: &str, kind: ColumnKind) -> Result<SqlValue, CoercionError> {
    to_sql(&Value::String(raw.to_string()), kind)
}

/// Driver value -> JSON, keyed by the column's declared kind.
pub fn from_sql(v: SqlValue, kind: ColumnKind) -> Value {
    match (kind, v) {
        (_, SqlValue::Null) => Value::Null,

        (ColumnKind::Boolean, SqlValue::Bool(b)) => Value::Bool(b),
        (ColumnKind::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (ColumnKind::Boolean, SqlValue::Real(f)) => Value::Bool(f != 0.0),
        (ColumnKind::Boolean, SqlValue::Text(s) | SqlValue::Numeric(s)) => match parse_bool(&s) {
            Some(b) => Value::Bool(b),
            None => Value::String(s),
        },

        (ColumnKind::DateTime, SqlValue::Text(s)) => match parse_datetime(&s) {
            Some(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            None => Value::String(s),
        },
        (ColumnKind::DateTime, SqlValue::Integer(secs)) => match DateTime::from_timestamp(secs, 0) {
            Some(dt) => Value::String(dt.naive_utc().format(DATETIME_FORMAT).to_string()),
            None => Value::Number(secs.into()),
        },

        (ColumnKind::Json, SqlValue::Text(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(s),
        },

        (ColumnKind::Text, SqlValue::Integer(i)) => Value::String(i.to_string()),
        (ColumnKind::Text, SqlValue::Real(f)) => Value::String(f.to_string()),
        (ColumnKind::Text, SqlValue::Bool(b)) => Value::String(b.to_string()),

        (ColumnKind::Integer | ColumnKind::Real, SqlValue::Text(s) | SqlValue::Numeric(s)) => {
            match s.trim().parse::<Number>() {
                Ok(n) => Value::Number(n),
                Err(_) => Value::String(s),
            }
        }
        (ColumnKind::Integer, SqlValue::Bool(b)) => Value::Number(i64::from(b).into()),

        (_, SqlValue::Bool(b)) => Value::Bool(b),
        (_, SqlValue::Integer(i)) => Value::Number(i.into()),
        (_, SqlValue::Real(f)) => real_to_json(f),
        (_, SqlValue::Text(s) | SqlValue::Numeric(s)) => Value::String(s),
    }
}

fn integer_from_number(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // 3.0 is an integer; 3.5 and u64 beyond i64::MAX are not
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn real_to_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts ISO-8601 / RFC 3339 (offsets are normalized to UTC) and `YYYY-MM-DD HH:MM:SS`.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // PostgreSQL timestamptz::text, e.g. "2023-01-02 03:04:05+00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_INPUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
}

//! Column type coercion.
//!
//! Raw values coming from a driver or from application properties are
//! normalized into the value domain of their column's SQL type. Coercion is
//! lenient, like a cast: a string on an integer column yields its leading
//! integer, or 0 when there is none.

use std::sync::OnceLock;

use regex::Regex;
use sqlrecord_core::Value;

/// The value domain a raw SQL type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDomain {
    /// `tinyint`, `smallint`, `mediumint`, `int`, `integer`, `bigint`.
    Integer,
    /// `char`, `varchar`, `tinytext`, `text`, `mediumtext`, `longtext`.
    Text,
    /// `double`, `float`, `decimal`.
    Float,
    /// Everything else; values pass through unchanged.
    Other,
}

impl ValueDomain {
    /// Classify a raw type string such as `varchar(255)` or `int(10) unsigned`.
    ///
    /// The size suffix and any trailing attributes are ignored.
    pub fn from_sql_type(raw: &str) -> Self {
        let base = raw
            .trim()
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match base.as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                ValueDomain::Integer
            }
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" => {
                ValueDomain::Text
            }
            "double" | "float" | "decimal" => ValueDomain::Float,
            _ => ValueDomain::Other,
        }
    }

    /// Convert `value` into this domain. NULL stays NULL in every domain.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ValueDomain::Other, v) => v,

            (ValueDomain::Integer, Value::Int(i)) => Value::Int(i),
            (ValueDomain::Integer, Value::Float(f)) => Value::Int(truncate(f)),
            (ValueDomain::Integer, Value::Bool(b)) => Value::Int(i64::from(b)),
            (ValueDomain::Integer, Value::Text(s)) => Value::Int(leading_int(&s)),
            (ValueDomain::Integer, Value::Bytes(b)) => {
                Value::Int(leading_int(&String::from_utf8_lossy(&b)))
            }

            (ValueDomain::Text, Value::Text(s)) => Value::Text(s),
            (ValueDomain::Text, Value::Int(i)) => Value::Text(i.to_string()),
            (ValueDomain::Text, Value::Float(f)) => Value::Text(f.to_string()),
            (ValueDomain::Text, Value::Bool(b)) => Value::Text(if b { "1" } else { "0" }.to_string()),
            (ValueDomain::Text, Value::Bytes(b)) => {
                Value::Text(String::from_utf8_lossy(&b).into_owned())
            }

            (ValueDomain::Float, Value::Float(f)) => Value::Float(f),
            (ValueDomain::Float, Value::Int(i)) => Value::Float(i as f64),
            (ValueDomain::Float, Value::Bool(b)) => Value::Float(if b { 1.0 } else { 0.0 }),
            (ValueDomain::Float, Value::Text(s)) => Value::Float(leading_float(&s)),
            (ValueDomain::Float, Value::Bytes(b)) => {
                Value::Float(leading_float(&String::from_utf8_lossy(&b)))
            }
        }
    }
}

/// Coerce `value` according to the raw column type string.
pub fn coerce(raw_type: &str, value: Value) -> Value {
    ValueDomain::from_sql_type(raw_type).coerce(value)
}

fn truncate(f: f64) -> i64 {
    if f.is_nan() { 0 } else { f.trunc() as i64 }
}

fn int_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*[+-]?\d+").expect("integer prefix pattern compiles"))
}

fn float_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?")
            .expect("float prefix pattern compiles")
    })
}

fn leading_int(s: &str) -> i64 {
    let Some(m) = int_prefix().find(s) else {
        return 0;
    };
    let digits = m.as_str().trim();
    digits.parse().unwrap_or_else(|_| {
        // Only overflow can fail here; saturate like a float-to-int cast.
        if digits.starts_with('-') { i64::MIN } else { i64::MAX }
    })
}

fn leading_float(s: &str) -> f64 {
    float_prefix()
        .find(s)
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(0.0)
}

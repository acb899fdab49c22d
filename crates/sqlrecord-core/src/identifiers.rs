//! Identifier validation.
//!
//! Table and column names are the only text ever interpolated into generated SQL.
//! Anything that reaches SQL text must pass [`is_valid_identifier`]; values are
//! always bound as parameters.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern compiles")
    })
}

/// True if `name` is a plain, unquoted SQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Return `name` unchanged if it is a plain identifier.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

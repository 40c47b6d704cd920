// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Scalar values of a row set
//!
//! Expected rows are written as [`Value`]s. A value is compared through its
//! canonical text token, which is the form a text-protocol engine reports, so
//! `Numeric("1.50")` only matches `1.50` and never `1.5`.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A row of a row set
pub type Row = Vec<Value>;

/// Non-finite floating point values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatSpecial {
    Infinity,
    NegativeInfinity,
    NaN,
}

impl FloatSpecial {
    /// The token the engine prints for this value
    pub fn token(&self) -> &'static str {
        match self {
            FloatSpecial::Infinity => "Infinity",
            FloatSpecial::NegativeInfinity => "-Infinity",
            FloatSpecial::NaN => "NaN",
        }
    }

    /// Recognize a token, case-sensitively
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Infinity" => Some(FloatSpecial::Infinity),
            "-Infinity" => Some(FloatSpecial::NegativeInfinity),
            "NaN" => Some(FloatSpecial::NaN),
            _ => None,
        }
    }
}

/// A semantically typed scalar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i64),
    /// Formatted numeric text, kept verbatim
    Numeric(String),
    Special(FloatSpecial),
    /// Any other formatted value (strings, arrays, composites, geometric types)
    Text(String),
}

impl Value {
    pub const NULL: Value = Value::Null;
    pub const INFINITY: Value = Value::Special(FloatSpecial::Infinity);
    pub const NEG_INFINITY: Value = Value::Special(FloatSpecial::NegativeInfinity);
    pub const NAN: Value = Value::Special(FloatSpecial::NaN);

    /// Numeric value from its formatted text
    pub fn numeric(text: impl Into<String>) -> Self {
        Value::Numeric(text.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// Float value; non-finite values map to their special tokens.
    ///
    /// Finite values are formatted with Rust's shortest round-trip formatting,
    /// which differs from most engines for very large or small magnitudes. Use
    /// [`Value::numeric`] when the exact engine formatting matters.
    pub fn float(value: f64) -> Self {
        if value.is_nan() {
            Value::NAN
        } else if value == f64::INFINITY {
            Value::INFINITY
        } else if value == f64::NEG_INFINITY {
            Value::NEG_INFINITY
        } else {
            Value::Numeric(value.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text token, `None` for NULL
    pub fn token(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::Bool(true) => Some(Cow::Borrowed("t")),
            Value::Bool(false) => Some(Cow::Borrowed("f")),
            Value::Int(i) => Some(Cow::Owned(i.to_string())),
            Value::Numeric(n) => Some(Cow::Borrowed(n)),
            Value::Special(s) => Some(Cow::Borrowed(s.token())),
            Value::Text(t) => Some(Cow::Borrowed(t)),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(t) => match t.as_str() {
                "t" | "true" => Some(true),
                "f" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Semantic equivalence between an expected value and an actual one
    ///
    /// NULL only matches NULL. Booleans accept both the short and the long
    /// spelling. Everything else compares by canonical token, case-sensitively.
    pub fn matches(&self, actual: &Value) -> bool {
        match (self, actual) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(b), other) | (other, Value::Bool(b)) => other.as_bool() == Some(*b),
            _ => self.token() == actual.token(),
        }
    }

    /// Render for diagnostics with the given NULL display string
    pub fn render(&self, null_display: &str) -> String {
        match self.token() {
            Some(token) => token.into_owned(),
            None => null_display.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token() {
            Some(token) => f.write_str(&token),
            None => f.write_str("NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<FloatSpecial> for Value {
    fn from(value: FloatSpecial) -> Self {
        Value::Special(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Row`] from values convertible into [`Value`]
///
/// ```
/// use sql_regress_fixture::{Value, row};
///
/// let r = row![1, "one", Value::NULL];
/// assert_eq!(r.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// Build a row set from bracketed rows
///
/// ```
/// use sql_regress_fixture::rows;
///
/// let set = rows![[1, "a"], [2, "b"]];
/// assert_eq!(set.len(), 2);
/// ```
#[macro_export]
macro_rules! rows {
    () => {
        ::std::vec::Vec::<$crate::Row>::new()
    };
    ($([$($value:expr),* $(,)?]),+ $(,)?) => {
        ::std::vec![$($crate::row![$($value),*]),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_matches_only_null() {
        assert!(Value::NULL.matches(&Value::Null));
        assert!(!Value::NULL.matches(&Value::text("")));
        assert!(!Value::text("NULL").matches(&Value::Null));
    }

    #[test]
    fn test_specials_match_their_tokens() {
        assert!(Value::NAN.matches(&Value::text("NaN")));
        assert!(Value::INFINITY.matches(&Value::text("Infinity")));
        assert!(Value::NEG_INFINITY.matches(&Value::text("-Infinity")));
        assert!(!Value::NAN.matches(&Value::text("nan")));
        assert!(!Value::NAN.matches(&Value::Null));
        assert!(!Value::INFINITY.matches(&Value::NEG_INFINITY));
    }

    #[test]
    fn test_numeric_compares_formatted_text() {
        assert!(Value::numeric("1.50").matches(&Value::text("1.50")));
        assert!(!Value::numeric("1.50").matches(&Value::text("1.5")));
        assert!(!Value::numeric("1e+20").matches(&Value::text("100000000000000000000")));
        assert!(Value::from(4567890123456789_i64).matches(&Value::text("4567890123456789")));
    }

    #[test]
    fn test_bool_spellings() {
        assert!(Value::from(true).matches(&Value::text("t")));
        assert!(Value::from(true).matches(&Value::text("true")));
        assert!(Value::text("f").matches(&Value::from(false)));
        assert!(!Value::from(true).matches(&Value::text("1")));
    }

    #[test]
    fn test_float_constructor() {
        assert_eq!(Value::float(f64::NAN), Value::NAN);
        assert_eq!(Value::float(f64::NEG_INFINITY), Value::NEG_INFINITY);
        assert_eq!(Value::float(2.5), Value::numeric("2.5"));
    }

    #[test]
    fn test_row_macros() {
        let r = row![1, "x", Value::NULL, Some(2), None::<i64>];
        assert_eq!(
            r,
            vec![
                Value::Int(1),
                Value::text("x"),
                Value::Null,
                Value::Int(2),
                Value::Null
            ]
        );
        let set = rows![[1], [2]];
        assert_eq!(set, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        assert!(rows![].is_empty());
    }

    #[test]
    fn test_render_uses_null_display() {
        assert_eq!(Value::NULL.render("(null)"), "(null)");
        assert_eq!(Value::from(false).render(""), "f");
    }
}

//! Dimension attribute values
//!
//! Attributes are kept as an ordered map so that comparisons, logging and
//! persisted column order are deterministic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered attribute map (column name to value)
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single scalar attribute value
///
/// Deserialization is untagged: JSON `null`, booleans and numbers map to the
/// matching variant, strings that parse as ISO dates become [`AttributeValue::Date`]
/// and every other string is [`AttributeValue::Text`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Returns the value as a string slice if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in log messages and errors
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::Date(_) => "date",
            AttributeValue::Text(_) => "text",
        }
    }
}

// Exact comparison. Floats compare bitwise, so an unchanged NaN equals itself.
// An integer equals a float only when the float holds exactly that integer,
// so a JSON `10` matches a stored `float8` 10.0.
impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => float_is_integer(*b, *a),
            (Date(a), Date(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            _ => false,
        }
    }
}

// `i64::MAX as f64` rounds up to 2^63, which is out of range.
fn float_is_integer(float: f64, integer: i64) -> bool {
    float.fract() == 0.0
        && float >= i64::MIN as f64
        && float < i64::MAX as f64
        && float as i64 == integer
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "NULL"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
            AttributeValue::Date(d) => write!(f, "{d}"),
            AttributeValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<NaiveDate> for AttributeValue {
    fn from(value: NaiveDate) -> Self {
        AttributeValue::Date(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Looks up an attribute, treating a missing entry as `NULL`
pub fn attribute_or_null<'a>(attributes: &'a Attributes, name: &str) -> &'a AttributeValue {
    static NULL: AttributeValue = AttributeValue::Null;
    attributes.get(name).unwrap_or(&NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("null", AttributeValue::Null ; "null")]
    #[test_case("true", AttributeValue::Bool(true) ; "bool")]
    #[test_case("12", AttributeValue::Integer(12) ; "integer")]
    #[test_case("1.5", AttributeValue::Float(1.5) ; "float")]
    #[test_case("\"2024-03-01\"", AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()) ; "date")]
    #[test_case("\"Johnny Doe\"", AttributeValue::Text("Johnny Doe".to_string()) ; "text")]
    fn test_deserialize_untagged(json: &str, expected: AttributeValue) {
        let value: AttributeValue = serde_json::from_str(json).unwrap();
        assert_eq!(value, expected);
        assert_eq!(value.type_name(), expected.type_name());
    }

    #[test]
    fn test_null_equals_null() {
        assert_eq!(AttributeValue::Null, AttributeValue::Null);
        assert_ne!(AttributeValue::Null, AttributeValue::Text(String::new()));
    }

    #[test]
    fn test_numeric_cross_comparison() {
        assert_eq!(AttributeValue::Integer(10), AttributeValue::Float(10.0));
        assert_ne!(AttributeValue::Integer(10), AttributeValue::Float(10.5));
    }

    #[test_case(9_007_199_254_740_993, 9_007_199_254_740_992.0, false ; "above 2^53")]
    #[test_case(9_007_199_254_740_992, 9_007_199_254_740_992.0, true ; "at 2^53")]
    #[test_case(i64::MAX, 9_223_372_036_854_775_808.0, false ; "float past i64 range")]
    #[test_case(i64::MIN, -9_223_372_036_854_775_808.0, true ; "i64 min")]
    #[test_case(0, f64::NAN, false ; "nan")]
    fn test_integer_float_comparison_is_exact(integer: i64, float: f64, equal: bool) {
        assert_eq!(
            AttributeValue::Integer(integer) == AttributeValue::Float(float),
            equal
        );
        assert_eq!(
            AttributeValue::Float(float) == AttributeValue::Integer(integer),
            equal
        );
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(AttributeValue::Float(f64::NAN), AttributeValue::Float(f64::NAN));
        assert_ne!(AttributeValue::Float(f64::NAN), AttributeValue::Float(0.0));
        assert_ne!(AttributeValue::Float(0.0), AttributeValue::Float(-0.0));
    }

    #[test]
    fn test_text_comparison_is_exact() {
        assert_ne!(AttributeValue::from("John Doe"), AttributeValue::from("john doe"));
        assert_ne!(AttributeValue::from("John Doe"), AttributeValue::from("John Doe "));
    }

    #[test]
    fn test_missing_attribute_reads_as_null() {
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "John".into());
        assert_eq!(attribute_or_null(&attrs, "name"), &AttributeValue::from("John"));
        assert!(attribute_or_null(&attrs, "city").is_null());
    }

    #[test]
    fn test_option_conversion() {
        assert!(AttributeValue::from(None::<i64>).is_null());
        assert_eq!(AttributeValue::from(Some(3_i64)), AttributeValue::Integer(3));
    }
}

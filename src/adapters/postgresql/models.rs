//! PostgreSQL value mapping
//!
//! Values whose column type is only known at run time (business keys and
//! attributes) are sent in text format and parsed by the server into whatever
//! type the column has. Attributes are read back through `to_jsonb`, so any
//! column type maps onto an [`AttributeValue`].

use crate::domain::{AttributeValue, DimensionVersion, Result, StarloadError};
use bytes::BytesMut;
use chrono::NaiveDate;
use serde_json::Value;
use std::error::Error;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::Row;

/// A string parameter the server coerces to the target column's type
#[derive(Debug, Clone, Copy)]
pub struct TextParam<'a>(pub &'a str);

impl ToSql for TextParam<'_> {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

impl ToSql for AttributeValue {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            AttributeValue::Null => Ok(IsNull::Yes),
            AttributeValue::Float(x) if x.is_infinite() => {
                out.extend_from_slice(if *x > 0.0 { b"Infinity" } else { b"-Infinity" });
                Ok(IsNull::No)
            }
            other => {
                out.extend_from_slice(other.to_string().as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Converts a `to_jsonb` value into an attribute
///
/// Scalars map onto their variant; arrays and objects are kept as JSON text.
pub fn attribute_from_json(value: Value) -> AttributeValue {
    match value {
        Value::Array(_) | Value::Object(_) => AttributeValue::Text(value.to_string()),
        scalar => serde_json::from_value(scalar.clone())
            .unwrap_or_else(|_| AttributeValue::Text(scalar.to_string())),
    }
}

/// Decodes a row selected by [`super::queries::select_versions`]
///
/// Column layout: surrogate key, business key, version, effective date,
/// expiry date, is current, then one `jsonb` column per attribute in
/// `attribute_names` order.
pub fn version_from_row(row: &Row, attribute_names: &[&String]) -> Result<DimensionVersion> {
    let version: i32 = row.try_get(2)?;
    let business_key: String = row.try_get(1)?;

    let mut attributes = crate::domain::Attributes::new();
    for (offset, name) in attribute_names.iter().enumerate() {
        let value: Option<Value> = row.try_get(6 + offset)?;
        let value = value.map(attribute_from_json).unwrap_or(AttributeValue::Null);
        if !value.is_null() {
            attributes.insert((*name).clone(), value);
        }
    }

    Ok(DimensionVersion {
        surrogate_key: row.try_get::<_, i64>(0)?.into(),
        business_key: crate::domain::BusinessKey::new(business_key)
            .map_err(StarloadError::Validation)?,
        attributes,
        version: u32::try_from(version).map_err(|_| {
            StarloadError::Validation(format!("negative version number {version}"))
        })?,
        effective_date: row.try_get::<_, NaiveDate>(3)?,
        expiry_date: row.try_get::<_, NaiveDate>(4)?,
        is_current: row.try_get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: &AttributeValue) -> Option<String> {
        let mut out = BytesMut::new();
        match value.to_sql(&Type::TEXT, &mut out).unwrap() {
            IsNull::Yes => None,
            IsNull::No => Some(String::from_utf8(out.to_vec()).unwrap()),
        }
    }

    #[test]
    fn test_attribute_text_encoding() {
        assert_eq!(encode(&AttributeValue::Null), None);
        assert_eq!(encode(&AttributeValue::from(12_i64)).as_deref(), Some("12"));
        assert_eq!(encode(&AttributeValue::from(true)).as_deref(), Some("true"));
        assert_eq!(
            encode(&AttributeValue::from(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())).as_deref(),
            Some("2024-03-01")
        );
        assert_eq!(
            encode(&AttributeValue::from(f64::NEG_INFINITY)).as_deref(),
            Some("-Infinity")
        );
    }

    #[test]
    fn test_text_params_use_text_format() {
        assert!(matches!(TextParam("42").encode_format(&Type::INT4), Format::Text));
        assert!(matches!(AttributeValue::Null.encode_format(&Type::DATE), Format::Text));
    }

    #[test]
    fn test_attribute_from_json() {
        assert_eq!(attribute_from_json(json!(7)), AttributeValue::Integer(7));
        assert_eq!(attribute_from_json(json!(12.5)), AttributeValue::Float(12.5));
        assert_eq!(attribute_from_json(json!("Leeds")), AttributeValue::from("Leeds"));
        assert_eq!(
            attribute_from_json(json!("2024-03-01")),
            AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(attribute_from_json(Value::Null).is_null());
        assert_eq!(attribute_from_json(json!([1, 2])), AttributeValue::from("[1,2]"));
    }
}

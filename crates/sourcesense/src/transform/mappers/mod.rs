//! Built-in attribute mappers, one per PostgreSQL entity kind.
//!
//! Every mapper is a plain function `fn(&RawRecord) -> Result<AttributeSet, MapError>`
//! registered in a [`MapperRegistry`](super::MapperRegistry). Mappers read
//! fields through [`Fields`], which applies the coercion rules uniformly:
//!
//! | reader      | missing / NULL | accepts                                   |
//! |-------------|----------------|-------------------------------------------|
//! | `text`      | `""`           | text, numbers and booleans (stringified)  |
//! | `number`    | `0`            | ints, floats, numeric text                |
//! | `boolean`   | given default  | bools, `YES`/`NO`/`true`/`false`, `0`/`1` |
//! | `flag`      | `false`        | bools, text compared to `"YES"`           |
//! | `list`      | `[]`           | lists, PostgreSQL array literals          |
//!
//! Anything else is a [`MapError::Coercion`].

mod column;
mod data_quality;
mod database;
mod foreign_key;
mod schema;
mod table;

pub use column::map_column;
pub use data_quality::map_data_quality;
pub use database::map_database;
pub use foreign_key::map_foreign_key;
pub use schema::map_schema;
pub use table::map_table;

use crate::core::{parse_pg_array, RawRecord, RawValue};

use super::error::MapError;

/// Key under which the dispatcher merges the connection qualified name.
pub const CONNECTION_QUALIFIED_NAME: &str = "connection_qualified_name";

/// Key under which the dispatcher merges the connection name.
pub const CONNECTION_NAME: &str = "connection_name";

/// Typed field reader over a raw record.
pub struct Fields<'a> {
    raw: &'a RawRecord,
}

impl<'a> Fields<'a> {
    pub fn new(raw: &'a RawRecord) -> Self {
        Self { raw }
    }

    /// Value for `key`, treating NULL as missing.
    fn present(&self, key: &str) -> Option<&'a RawValue> {
        self.raw.get(key).filter(|v| !v.is_null())
    }

    /// Text field, defaulting to `""`.
    pub fn text(&self, key: &str) -> Result<String, MapError> {
        self.text_or(key, "")
    }

    /// Text field with an explicit default.
    pub fn text_or(&self, key: &str, default: &str) -> Result<String, MapError> {
        match self.present(key) {
            None => Ok(default.to_string()),
            Some(v @ RawValue::List(_)) => Err(MapError::coercion(key, "text", v)),
            Some(v) => Ok(v.to_string()),
        }
    }

    /// Numeric field, defaulting to `0`.
    pub fn number(&self, key: &str) -> Result<RawValue, MapError> {
        self.number_or(key, 0)
    }

    /// Numeric field with an explicit integer default.
    ///
    /// Integer and float values keep their representation; numeric text is
    /// parsed, preferring integers.
    pub fn number_or(&self, key: &str, default: i64) -> Result<RawValue, MapError> {
        match self.present(key) {
            None => Ok(RawValue::Int(default)),
            Some(v @ (RawValue::Int(_) | RawValue::Float(_))) => Ok(v.clone()),
            Some(v @ RawValue::Text(s)) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Ok(RawValue::Int(i))
                } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
                    Ok(RawValue::Float(f))
                } else {
                    Err(MapError::coercion(key, "number", v))
                }
            }
            Some(v) => Err(MapError::coercion(key, "number", v)),
        }
    }

    /// Boolean field with an explicit default.
    pub fn boolean(&self, key: &str, default: bool) -> Result<bool, MapError> {
        match self.present(key) {
            None => Ok(default),
            Some(RawValue::Bool(b)) => Ok(*b),
            Some(RawValue::Int(0)) => Ok(false),
            Some(RawValue::Int(1)) => Ok(true),
            Some(v @ RawValue::Text(s)) => match s.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "T" | "1" => Ok(true),
                "NO" | "N" | "FALSE" | "F" | "0" => Ok(false),
                _ => Err(MapError::coercion(key, "boolean", v)),
            },
            Some(v) => Err(MapError::coercion(key, "boolean", v)),
        }
    }

    /// `YES`/`NO` flag: true only for the exact text `"YES"`.
    pub fn flag(&self, key: &str) -> Result<bool, MapError> {
        match self.present(key) {
            None => Ok(false),
            Some(RawValue::Bool(b)) => Ok(*b),
            Some(RawValue::Text(s)) => Ok(s == "YES"),
            Some(v) => Err(MapError::coercion(key, "YES/NO flag", v)),
        }
    }

    /// Ordered list field, defaulting to an empty sequence.
    pub fn list(&self, key: &str) -> Result<RawValue, MapError> {
        match self.present(key) {
            None => Ok(RawValue::List(Vec::new())),
            Some(RawValue::List(items)) => Ok(RawValue::List(items.clone())),
            Some(v @ RawValue::Text(s)) => parse_pg_array(s)
                .map(RawValue::List)
                .ok_or_else(|| MapError::coercion(key, "list", v)),
            Some(v) => Err(MapError::coercion(key, "list", v)),
        }
    }

    /// Connection qualified name merged in by the dispatcher.
    pub fn connection_qualified_name(&self) -> Result<String, MapError> {
        self.text(CONNECTION_QUALIFIED_NAME)
    }
}

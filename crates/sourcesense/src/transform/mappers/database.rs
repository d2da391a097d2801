//! DATABASE mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

/// Map a `pg_database` row.
///
/// Qualified name: `connection/database`.
pub fn map_database(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let database = f.text("database_name")?;

    Ok(AttributeSet::new()
        .attr("name", database.as_str())
        .attr(
            "qualifiedName",
            build_qualified_name(&[connection.as_str(), database.as_str()]),
        )
        .attr("connectionQualifiedName", connection)
        .custom("database_size", f.text("database_size")?)
        .custom("collation", f.text("collation")?)
        .custom("character_type", f.text("character_type")?)
        .custom("connection_limit", f.text("connection_limit_display")?)
        .custom("allows_connections", f.boolean("allows_connections", true)?)
        .custom("is_template", f.boolean("is_template", false)?)
        .custom("size_bytes", f.number("size_bytes")?)
        .custom("active_connections", f.number("active_connections")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    #[test]
    fn test_database_mapping() {
        let raw = RawRecord::new()
            .with("connection_qualified_name", "default/postgres/1")
            .with("database_name", "shop")
            .with("database_size", "8 MB")
            .with("allows_connections", "NO")
            .with("is_template", "NO")
            .with("size_bytes", 8_388_608i64);

        let set = map_database(&raw).unwrap();
        assert_eq!(set.attributes["name"], RawValue::from("shop"));
        assert_eq!(
            set.attributes["qualifiedName"],
            RawValue::from("default/postgres/1/shop")
        );
        assert_eq!(set.custom_attributes["allows_connections"], RawValue::Bool(false));
        assert_eq!(set.custom_attributes["size_bytes"], RawValue::Int(8_388_608));
        assert_eq!(set.custom_attributes["active_connections"], RawValue::Int(0));
    }

    #[test]
    fn test_database_defaults() {
        let set = map_database(&RawRecord::new()).unwrap();
        assert!(set.has_identity());
        assert_eq!(set.custom_attributes["allows_connections"], RawValue::Bool(true));
        assert_eq!(set.custom_attributes["is_template"], RawValue::Bool(false));
        assert_eq!(set.custom_attributes["connection_limit"], RawValue::from(""));
    }
}

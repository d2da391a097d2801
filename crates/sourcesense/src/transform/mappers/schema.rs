//! SCHEMA mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

/// Map an `information_schema.schemata` row enriched with object counts.
///
/// Qualified name: `connection/database/schema`, where the database comes
/// from `default_character_set_catalog`.
pub fn map_schema(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let database = f.text("default_character_set_catalog")?;
    let schema = f.text("schema_name")?;

    Ok(AttributeSet::new()
        .attr("name", schema.as_str())
        .attr(
            "qualifiedName",
            build_qualified_name(&[connection.as_str(), database.as_str(), schema.as_str()]),
        )
        .attr("connectionQualifiedName", connection)
        .attr("databaseName", database)
        .attr("tableCount", f.number("table_count")?)
        .attr("viewCount", f.number("view_count")?)
        .custom("schema_owner", f.text("schema_owner")?)
        .custom("default_character_set_name", f.text("default_character_set_name")?)
        .custom("sql_path", f.text("sql_path")?)
        .custom("materialized_view_count", f.number("materialized_view_count")?)
        .custom("foreign_table_count", f.number("foreign_table_count")?)
        .custom("total_objects", f.number("total_objects")?)
        .custom("function_count", f.number("function_count")?)
        .custom("aggregate_count", f.number("aggregate_count")?)
        .custom("window_count", f.number("window_count")?)
        .custom("procedure_count", f.number("procedure_count")?)
        .custom("description", f.text("description")?)
        .custom("schema_qualified_name", f.text("schema_qualified_name")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    #[test]
    fn test_schema_mapping() {
        let raw = RawRecord::new()
            .with("connection_qualified_name", "conn1")
            .with("default_character_set_catalog", "shop")
            .with("schema_name", "sales")
            .with("table_count", 4i64)
            .with("function_count", "2");

        let set = map_schema(&raw).unwrap();
        assert_eq!(set.attributes["qualifiedName"], RawValue::from("conn1/shop/sales"));
        assert_eq!(set.attributes["databaseName"], RawValue::from("shop"));
        assert_eq!(set.attributes["tableCount"], RawValue::Int(4));
        assert_eq!(set.attributes["viewCount"], RawValue::Int(0));
        assert_eq!(set.custom_attributes["function_count"], RawValue::Int(2));
        assert!(set.overlapping_keys().is_empty());
    }

    #[test]
    fn test_schema_rejects_non_numeric_count() {
        let raw = RawRecord::new().with("table_count", "several");
        assert!(map_schema(&raw).is_err());
    }
}

//! TABLE mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

/// Map a table row with statistics, sizes, constraint and partition info.
///
/// Qualified name: `connection/catalog/schema/table`.
pub fn map_table(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let catalog = f.text("table_catalog")?;
    let schema = f.text("table_schema")?;
    let table = f.text("table_name")?;

    let qualified_name = build_qualified_name(&[
        connection.as_str(),
        catalog.as_str(),
        schema.as_str(),
        table.as_str(),
    ]);

    let mut set = AttributeSet::new()
        .attr("name", table)
        .attr("schemaName", schema)
        .attr("databaseName", catalog)
        .attr("qualifiedName", qualified_name)
        .attr("connectionQualifiedName", connection)
        .custom("table_type", f.text("table_type")?);

    for key in [
        "estimated_row_count",
        "dead_row_count",
        "total_inserts",
        "total_updates",
        "total_deletes",
    ] {
        set = set.custom(key, f.number(key)?);
    }

    set = set
        .custom("last_vacuum", f.text("last_vacuum")?)
        .custom("last_analyze", f.text("last_analyze")?)
        .custom("vacuum_count", f.number("vacuum_count")?)
        .custom("analyze_count", f.number("analyze_count")?)
        .custom("total_size", f.text("total_size")?)
        .custom("total_size_bytes", f.number("total_size_bytes")?)
        .custom("table_size", f.text("table_size")?)
        .custom("table_size_bytes", f.number("table_size_bytes")?)
        .custom("indexes_size", f.text("indexes_size")?)
        .custom("indexes_size_bytes", f.number("indexes_size_bytes")?);

    for key in [
        "constraint_count",
        "primary_key_count",
        "foreign_key_count",
        "unique_constraint_count",
        "check_constraint_count",
        "index_count",
        "unique_index_count",
        "primary_index_count",
    ] {
        set = set.custom(key, f.number(key)?);
    }

    Ok(set
        .custom("description", f.text("description")?)
        .custom("is_partitioned", f.boolean("is_partitioned", false)?)
        .custom("partition_strategy", f.text("partition_strategy")?)
        .custom("partition_column_count", f.number("partition_column_count")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    #[test]
    fn test_table_mapping() {
        let raw = RawRecord::new()
            .with("connection_qualified_name", "conn1")
            .with("table_name", "orders")
            .with("table_schema", "public")
            .with("table_catalog", "shop")
            .with("estimated_row_count", 120i64)
            .with("total_size", "16 kB")
            .with("is_partitioned", false);

        let set = map_table(&raw).unwrap();
        assert_eq!(set.attributes["name"], RawValue::from("orders"));
        assert_eq!(
            set.attributes["qualifiedName"],
            RawValue::from("conn1/shop/public/orders")
        );
        assert_eq!(set.attributes["schemaName"], RawValue::from("public"));
        assert_eq!(set.custom_attributes["estimated_row_count"], RawValue::Int(120));
        assert_eq!(set.custom_attributes["total_size"], RawValue::from("16 kB"));
        assert_eq!(set.custom_attributes["dead_row_count"], RawValue::Int(0));
        assert!(set.overlapping_keys().is_empty());
    }

    #[test]
    fn test_table_malformed_count() {
        let raw = RawRecord::new()
            .with("table_name", "orders")
            .with("estimated_row_count", vec!["x"]);
        let err = map_table(&raw).unwrap_err();
        assert!(err.to_string().contains("estimated_row_count"));
    }
}

//! COLUMN mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

const NUMERIC_FIELDS: &[&str] = &[
    "character_maximum_length",
    "character_octet_length",
    "numeric_precision",
    "numeric_precision_radix",
    "numeric_scale",
    "datetime_precision",
];

const IDENTITY_BOUNDS: &[&str] = &[
    "identity_start",
    "identity_increment",
    "identity_maximum",
    "identity_minimum",
];

/// `pg_stats` derived statistics.
const STATISTIC_FIELDS: &[&str] = &[
    "distinct_value_count",
    "estimated_distinct_values",
    "null_fraction",
    "average_width",
    "correlation",
];

const STATISTIC_LISTS: &[&str] = &[
    "most_common_values",
    "most_common_frequencies",
    "histogram_bounds",
];

const CONSTRAINT_FIELDS: &[&str] = &[
    "constraint_name",
    "constraint_type",
    "foreign_table_schema",
    "foreign_table_name",
    "foreign_column_name",
    "foreign_key_update_rule",
    "foreign_key_delete_rule",
];

const SEQUENCE_NUMBERS: &[&str] = &[
    "sequence_last_value",
    "sequence_start_value",
    "sequence_increment",
    "sequence_max_value",
    "sequence_min_value",
];

/// Map an `information_schema.columns` row with statistics, constraint,
/// index and sequence details.
///
/// Qualified name: `connection/catalog/schema/table/column`. `isNullable`
/// is true only when `is_nullable` is the text `"YES"`; `order` defaults to 1.
pub fn map_column(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let catalog = f.text("table_catalog")?;
    let schema = f.text("table_schema")?;
    let table = f.text("table_name")?;
    let column = f.text("column_name")?;

    let qualified_name = build_qualified_name(&[
        connection.as_str(),
        catalog.as_str(),
        schema.as_str(),
        table.as_str(),
        column.as_str(),
    ]);

    let mut set = AttributeSet::new()
        .attr("name", column)
        .attr("qualifiedName", qualified_name)
        .attr("connectionQualifiedName", connection)
        .attr("tableName", table)
        .attr("schemaName", schema)
        .attr("databaseName", catalog)
        .attr("isNullable", f.flag("is_nullable")?)
        .attr("dataType", f.text("data_type")?)
        .attr("order", f.number_or("ordinal_position", 1)?)
        .custom("column_default", f.text("column_default")?);

    for &key in NUMERIC_FIELDS {
        set = set.custom(key, f.number(key)?);
    }

    set = set
        .custom("interval_type", f.text("interval_type")?)
        .custom("interval_precision", f.number("interval_precision")?)
        .custom("character_set_name", f.text("character_set_name")?)
        .custom("collation_name", f.text("collation_name")?)
        .custom("domain_name", f.text("domain_name")?)
        .custom("udt_name", f.text("udt_name")?)
        .custom("is_identity", f.flag("is_identity")?)
        .custom("identity_generation", f.text("identity_generation")?);

    for &key in IDENTITY_BOUNDS {
        set = set.custom(key, f.number(key)?);
    }

    set = set
        .custom("identity_cycle", f.flag("identity_cycle")?)
        .custom("is_generated", f.flag("is_generated")?)
        .custom("generation_expression", f.text("generation_expression")?)
        .custom("is_updatable", f.flag("is_updatable")?);

    for &key in STATISTIC_FIELDS {
        set = set.custom(key, f.number(key)?);
    }
    for &key in STATISTIC_LISTS {
        set = set.custom(key, f.list(key)?);
    }
    for &key in CONSTRAINT_FIELDS {
        set = set.custom(key, f.text(key)?);
    }

    set = set
        .custom("index_count", f.number("index_count")?)
        .custom("unique_index_count", f.number("unique_index_count")?)
        .custom("primary_index_count", f.number("primary_index_count")?)
        .custom("index_names", f.text("index_names")?)
        .custom("sequence_name", f.text("sequence_name")?);

    for &key in SEQUENCE_NUMBERS {
        set = set.custom(key, f.number(key)?);
    }

    Ok(set
        .custom("sequence_is_cycled", f.boolean("sequence_is_cycled", false)?)
        .custom("description", f.text("description")?)
        .custom("full_data_type", f.text("full_data_type")?)
        .custom("auto_increment_type", f.text_or("auto_increment_type", "NONE")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    fn orders_id() -> RawRecord {
        RawRecord::new()
            .with("connection_qualified_name", "conn1")
            .with("table_catalog", "shop")
            .with("table_schema", "public")
            .with("table_name", "orders")
            .with("column_name", "id")
            .with("is_nullable", "NO")
            .with("data_type", "integer")
            .with("ordinal_position", 1i64)
            .with("is_identity", "YES")
            .with("null_fraction", 0.0)
            .with("most_common_values", "{1,2,3}")
    }

    #[test]
    fn test_column_mapping() {
        let set = map_column(&orders_id()).unwrap();
        assert_eq!(
            set.attributes["qualifiedName"],
            RawValue::from("conn1/shop/public/orders/id")
        );
        assert_eq!(set.attributes["isNullable"], RawValue::Bool(false));
        assert_eq!(set.attributes["dataType"], RawValue::from("integer"));
        assert_eq!(set.custom_attributes["is_identity"], RawValue::Bool(true));
        assert_eq!(
            set.custom_attributes["most_common_values"],
            RawValue::List(vec!["1".into(), "2".into(), "3".into()])
        );
        assert!(set.overlapping_keys().is_empty());
    }

    #[test]
    fn test_nullable_yes() {
        let raw = orders_id().with("is_nullable", "YES");
        let set = map_column(&raw).unwrap();
        assert_eq!(set.attributes["isNullable"], RawValue::Bool(true));
    }

    #[test]
    fn test_column_defaults() {
        let set = map_column(&RawRecord::new()).unwrap();
        assert_eq!(set.attributes["order"], RawValue::Int(1));
        assert_eq!(set.attributes["isNullable"], RawValue::Bool(false));
        assert_eq!(set.custom_attributes["histogram_bounds"], RawValue::List(vec![]));
        assert_eq!(set.custom_attributes["numeric_scale"], RawValue::Int(0));
        assert_eq!(set.custom_attributes["auto_increment_type"], RawValue::from("NONE"));
        assert_eq!(set.custom_attributes["sequence_is_cycled"], RawValue::Bool(false));
    }
}

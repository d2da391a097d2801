//! FOREIGN_KEY mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

const TEXT_FIELDS: &[&str] = &[
    "source_schema",
    "source_table",
    "source_column",
    "target_schema",
    "target_table",
    "target_column",
    "constraint_name",
    "update_rule",
    "delete_rule",
];

const DESCRIPTIVE_FIELDS: &[&str] = &[
    "constraint_definition",
    "source_description",
    "target_description",
    "constraint_description",
    "update_action",
    "delete_action",
    "relationship_strength",
];

/// Map a foreign key relationship row.
///
/// Qualified name: `connection/source_schema/source_table/source_column/constraint`.
/// The constraint is keyed by its source column, so multi-column keys yield
/// one entity per column.
pub fn map_foreign_key(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let constraint = f.text("constraint_name")?;

    let qualified_name = build_qualified_name(&[
        connection.clone(),
        f.text("source_schema")?,
        f.text("source_table")?,
        f.text("source_column")?,
        constraint.clone(),
    ]);

    let mut set = AttributeSet::new()
        .attr("name", constraint)
        .attr("qualifiedName", qualified_name)
        .attr("connectionQualifiedName", connection)
        .attr("sourceQualifiedName", f.text("source_qualified_name")?)
        .attr("targetQualifiedName", f.text("target_qualified_name")?);

    for &key in TEXT_FIELDS {
        set = set.custom(key, f.text(key)?);
    }

    set = set
        .custom("is_deferrable", f.boolean("is_deferrable", false)?)
        .custom("initially_deferred", f.boolean("initially_deferred", false)?)
        .custom("is_validated", f.boolean("is_validated", true)?)
        .custom("is_no_inherit", f.boolean("is_no_inherit", false)?);

    for &key in DESCRIPTIVE_FIELDS {
        set = set.custom(key, f.text(key)?);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    #[test]
    fn test_foreign_key_mapping() {
        let raw = RawRecord::new()
            .with("connection_qualified_name", "conn1")
            .with("constraint_name", "orders_customer_fk")
            .with("source_schema", "public")
            .with("source_table", "orders")
            .with("source_column", "customer_id")
            .with("target_schema", "public")
            .with("target_table", "customers")
            .with("target_column", "id")
            .with("delete_rule", "CASCADE")
            .with("is_deferrable", "NO");

        let set = map_foreign_key(&raw).unwrap();
        assert_eq!(set.attributes["name"], RawValue::from("orders_customer_fk"));
        assert_eq!(
            set.attributes["qualifiedName"],
            RawValue::from("conn1/public/orders/customer_id/orders_customer_fk")
        );
        assert_eq!(set.custom_attributes["target_table"], RawValue::from("customers"));
        assert_eq!(set.custom_attributes["delete_rule"], RawValue::from("CASCADE"));
        assert_eq!(set.custom_attributes["is_deferrable"], RawValue::Bool(false));
        assert_eq!(set.custom_attributes["is_validated"], RawValue::Bool(true));
        assert!(set.overlapping_keys().is_empty());
    }
}

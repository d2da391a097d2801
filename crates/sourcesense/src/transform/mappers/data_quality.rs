//! DATA_QUALITY mapper.

use crate::core::{build_qualified_name, AttributeSet, RawRecord};
use crate::transform::error::MapError;

use super::Fields;

const TIMESTAMP_FIELDS: &[&str] = &[
    "last_vacuum",
    "last_autovacuum",
    "last_analyze",
    "last_autoanalyze",
];

const COUNTERS: &[&str] = &[
    "vacuum_count",
    "autovacuum_count",
    "analyze_count",
    "autoanalyze_count",
    "hours_since_last_analyze",
    "hours_since_last_vacuum",
    "change_ratio",
];

const PROFILE_FIELDS: &[&str] = &[
    "total_size_bytes",
    "table_size_bytes",
    "indexes_size_bytes",
    "toast_size_bytes",
    "total_columns",
    "high_null_columns",
    "medium_null_columns",
    "low_null_columns",
    "no_null_columns",
    "constant_columns",
    "low_cardinality_columns",
    "medium_cardinality_columns",
    "high_cardinality_columns",
    "quality_score",
    "freshness_score",
];

/// Map a per-table data quality profile.
///
/// The display name is synthesized as `"{schema}.{table}_quality"` from
/// `schemaname` and `tablename`; the qualified name is
/// `connection/schema/table/data_quality`.
pub fn map_data_quality(raw: &RawRecord) -> Result<AttributeSet, MapError> {
    let f = Fields::new(raw);
    let connection = f.connection_qualified_name()?;
    let schema = f.text("schemaname")?;
    let table = f.text("tablename")?;

    let qualified_name = build_qualified_name(&[
        connection.as_str(),
        schema.as_str(),
        table.as_str(),
        "data_quality",
    ]);

    let mut set = AttributeSet::new()
        .attr("name", format!("{}.{}_quality", schema, table))
        .attr("qualifiedName", qualified_name)
        .attr("connectionQualifiedName", connection)
        .attr("schemaName", schema)
        .attr("tableName", table)
        .custom("live_tuples", f.number("live_tuples")?)
        .custom("dead_tuples", f.number("dead_tuples")?)
        .custom("total_inserts", f.number("total_inserts")?)
        .custom("total_updates", f.number("total_updates")?)
        .custom("total_deletes", f.number("total_deletes")?);

    for &key in TIMESTAMP_FIELDS {
        set = set.custom(key, f.text(key)?);
    }
    for &key in COUNTERS {
        set = set.custom(key, f.number(key)?);
    }
    set = set.custom("dead_tuple_status", f.text("dead_tuple_status")?);
    for &key in PROFILE_FIELDS {
        set = set.custom(key, f.number(key)?);
    }

    Ok(set)
}

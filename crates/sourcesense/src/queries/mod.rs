//! Extraction queries.
//!
//! Every built-in kind ships with a default query. A directory of
//! `<kind>.sql` files (lower-case kind label) overrides them one by one.
//! Queries use `{name}` placeholders bound by
//! [`prepare_query`](crate::activity::prepare_query).

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::activity::ExtractionStep;
use crate::core::EntityKind;
use crate::error::{ExtractError, Result};

const DATABASE_SQL: &str = include_str!("sql/database.sql");
const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const TABLE_SQL: &str = include_str!("sql/table.sql");
const COLUMN_SQL: &str = include_str!("sql/column.sql");
const FOREIGN_KEY_SQL: &str = include_str!("sql/foreign_key.sql");
const DATA_QUALITY_SQL: &str = include_str!("sql/data_quality.sql");

/// Preflight: number of tables that pass the include/exclude and table filters.
pub const TABLES_CHECK_SQL: &str = include_str!("sql/tables_check.sql");

/// Preflight: catalog/schema pairs selected by the include/exclude filters.
pub const METADATA_SQL: &str = include_str!("sql/metadata.sql");

/// Default query for a built-in kind.
pub fn builtin(kind: &EntityKind) -> Option<&'static str> {
    match kind.as_str() {
        "DATABASE" => Some(DATABASE_SQL),
        "SCHEMA" => Some(SCHEMA_SQL),
        "TABLE" => Some(TABLE_SQL),
        "COLUMN" => Some(COLUMN_SQL),
        "FOREIGN_KEY" => Some(FOREIGN_KEY_SQL),
        "DATA_QUALITY" => Some(DATA_QUALITY_SQL),
        _ => None,
    }
}

/// Queries by kind.
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    queries: BTreeMap<EntityKind, String>,
}

impl QuerySet {
    /// The built-in queries.
    pub fn builtin() -> Self {
        let queries = EntityKind::builtins()
            .into_iter()
            .filter_map(|kind| builtin(&kind).map(|sql| (kind, sql.to_string())))
            .collect();
        Self { queries }
    }

    /// Built-in queries with overrides from `dir`, if given.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut set = Self::builtin();
        if let Some(dir) = dir {
            set.apply_overrides(dir)?;
        }
        Ok(set)
    }

    /// Replace queries with `<kind>.sql` files found in `dir`.
    ///
    /// Files for kinds without a built-in query are added as new kinds. Such a
    /// kind may be named in `extraction.steps`; its rows produce envelopes
    /// only once a mapper for it is registered on the transformer.
    pub fn apply_overrides(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(ExtractError::Config(format!(
                "queries directory not found: {}",
                dir.display()
            )));
        }

        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        entries.sort();

        for path in entries {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let sql = std::fs::read_to_string(&path)?;
            let kind = EntityKind::new(stem);
            info!("Using query override for {} from {}", kind, path.display());
            self.queries.insert(kind, sql);
        }
        Ok(())
    }

    /// Set the query for a kind.
    pub fn insert(&mut self, kind: impl Into<EntityKind>, sql: impl Into<String>) {
        self.queries.insert(kind.into(), sql.into());
    }

    pub fn get(&self, kind: &EntityKind) -> Option<&str> {
        self.queries.get(kind).map(String::as_str)
    }

    /// Build the steps for `kinds`, in the order given.
    pub fn steps(&self, kinds: &[EntityKind]) -> Result<Vec<ExtractionStep>> {
        kinds
            .iter()
            .map(|kind| {
                self.get(kind)
                    .map(|sql| ExtractionStep::new(kind.clone(), sql))
                    .ok_or_else(|| {
                        ExtractError::Config(format!("No query configured for step: {}", kind))
                    })
            })
            .collect()
    }
}

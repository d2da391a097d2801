//! Configuration validation.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use super::Config;
use crate::core::EntityKind;
use crate::error::{ExtractError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(ExtractError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(ExtractError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(ExtractError::Config("source.user is required".into()));
    }
    if config.source.r#type != "postgres" {
        return Err(ExtractError::Config(format!(
            "source.type must be 'postgres', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.max_connections == 0 {
        return Err(ExtractError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }

    if config.connection.qualified_name.is_empty() {
        return Err(ExtractError::Config(
            "connection.qualified_name is required".into(),
        ));
    }

    let extraction = &config.extraction;
    if extraction.batch_size == 0 {
        return Err(ExtractError::Config(
            "extraction.batch_size must be at least 1".into(),
        ));
    }
    if let Some(0) = extraction.concurrency {
        return Err(ExtractError::Config(
            "extraction.concurrency must be at least 1".into(),
        ));
    }
    if extraction.steps.is_empty() {
        return Err(ExtractError::Config(
            "extraction.steps must name at least one step".into(),
        ));
    }

    let custom = custom_query_kinds(extraction.queries_dir.as_deref());
    let mut seen = HashSet::new();
    for step in &extraction.steps {
        let kind = EntityKind::new(step);
        if !EntityKind::builtins().contains(&kind) && !custom.contains(&kind) {
            return Err(ExtractError::Config(format!(
                "extraction.steps: unknown step '{}' (no built-in or queries_dir query)",
                step
            )));
        }
        // Steps of the same kind would write the same partitions
        if !seen.insert(kind) {
            return Err(ExtractError::Config(format!(
                "extraction.steps: duplicate step '{}'",
                step
            )));
        }
    }

    // Best-effort pre-check only: the filters run as PostgreSQL regular
    // expressions (`~`/`!~`), whose syntax differs from the regex crate in
    // places, so a pattern can pass here and still fail at query time, or
    // be rejected here (e.g. backreferences) though PostgreSQL accepts it.
    for (field, pattern) in [
        ("include_regex", &extraction.include_regex),
        ("exclude_regex", &extraction.exclude_regex),
        ("exclude_table_regex", &extraction.exclude_table_regex),
    ] {
        if let Err(e) = Regex::new(pattern) {
            return Err(ExtractError::Config(format!(
                "extraction.{} is not a valid regex: {}",
                field, e
            )));
        }
    }

    Ok(())
}

/// Kinds with a `<kind>.sql` file in the queries directory.
///
/// A missing or unreadable directory yields no kinds; loading the query set
/// reports it.
fn custom_query_kinds(dir: Option<&Path>) -> HashSet<EntityKind> {
    let Some(Ok(entries)) = dir.map(std::fs::read_dir) else {
        return HashSet::new();
    };
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(EntityKind::new))
        .collect()
}

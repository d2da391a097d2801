//! Row-to-entity transformation.
//!
//! A [`Transformer`] resolves an entity kind to its [`AttributeMapper`],
//! runs it over the raw record (with connection context merged in), adds
//! run provenance and wraps the result in an [`EntityEnvelope`].
//!
//! Row-level problems never abort a batch. They come back as
//! [`TransformFailure`] values; [`Transformer::transform_row`] and
//! [`Transformer::transform_batch`] log them and skip the row.

pub mod enrich;
pub mod error;
pub mod mappers;
pub mod registry;

pub use enrich::{enrich, RunIdentity, LAST_SYNC_RUN, LAST_SYNC_WORKFLOW};
pub use error::{MapError, TransformFailure};
pub use registry::{AttributeMapper, MapperRegistry};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{EntityEnvelope, EntityKind, RawRecord};

use mappers::{CONNECTION_NAME, CONNECTION_QUALIFIED_NAME};

/// Connection identity merged into every raw record before mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformContext {
    pub connection_qualified_name: String,
    pub connection_name: String,
}

impl TransformContext {
    pub fn new(connection_qualified_name: impl Into<String>, connection_name: impl Into<String>) -> Self {
        Self {
            connection_qualified_name: connection_qualified_name.into(),
            connection_name: connection_name.into(),
        }
    }

    fn apply(&self, raw: &mut RawRecord) {
        raw.insert(CONNECTION_QUALIFIED_NAME, self.connection_qualified_name.as_str());
        raw.insert(CONNECTION_NAME, self.connection_name.as_str());
    }
}

/// Result of transforming a batch of rows of one kind.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Envelopes for the rows that transformed, in input order.
    pub envelopes: Vec<EntityEnvelope>,
    /// Rows rejected by the mapper.
    pub failed: usize,
    /// Rows skipped because the kind had no mapper.
    pub unknown_kind: usize,
}

impl BatchOutcome {
    /// Rows that produced no envelope.
    pub fn skipped(&self) -> usize {
        self.failed + self.unknown_kind
    }
}

/// Polymorphic dispatcher from (kind, raw record) to envelope.
#[derive(Debug, Clone)]
pub struct Transformer {
    registry: MapperRegistry,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Transformer {
    /// Create a transformer over the given registry.
    pub fn new(registry: MapperRegistry) -> Self {
        Self { registry }
    }

    /// Create a transformer with the built-in PostgreSQL mappers.
    pub fn with_builtins() -> Self {
        Self::new(MapperRegistry::with_builtins())
    }

    /// The default registry.
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Mutable access to the default registry, for configuration before use.
    pub fn registry_mut(&mut self) -> &mut MapperRegistry {
        &mut self.registry
    }

    /// Transform one raw record.
    ///
    /// `kind` is matched case-insensitively. When `registry_override` is
    /// given it replaces the default registry for this call only. The raw
    /// record is not modified.
    pub fn transform(
        &self,
        kind: &str,
        raw: &RawRecord,
        run: &RunIdentity,
        ctx: &TransformContext,
        registry_override: Option<&MapperRegistry>,
    ) -> Result<EntityEnvelope, TransformFailure> {
        let kind = EntityKind::new(kind);
        let registry = registry_override.unwrap_or(&self.registry);

        let mapper = registry
            .get(&kind)
            .ok_or_else(|| TransformFailure::UnknownKind { kind: kind.clone() })?;

        let mut record = raw.clone();
        ctx.apply(&mut record);

        let mut set = mapper.map(&record).map_err(|source| TransformFailure::Mapper {
            kind: kind.clone(),
            source,
            record: record.clone(),
        })?;

        if !set.has_identity() {
            return Err(TransformFailure::Mapper {
                kind,
                source: MapError::Invalid("mapper produced no name/qualifiedName".into()),
                record,
            });
        }

        set.merge(run.enrich(&record));

        let overlap = set.overlapping_keys();
        if !overlap.is_empty() {
            let message = format!("keys in both attribute sets: {}", overlap.join(", "));
            return Err(TransformFailure::Mapper {
                kind,
                source: MapError::Invalid(message),
                record,
            });
        }

        Ok(EntityEnvelope::active(kind, set))
    }

    /// Transform one raw record, logging and discarding any failure.
    pub fn transform_row(
        &self,
        kind: &str,
        raw: &RawRecord,
        run: &RunIdentity,
        ctx: &TransformContext,
    ) -> Option<EntityEnvelope> {
        match self.transform(kind, raw, run, ctx, None) {
            Ok(envelope) => Some(envelope),
            Err(failure) => {
                failure.report();
                None
            }
        }
    }

    /// Transform a batch of rows of one kind.
    ///
    /// Failed rows are logged and counted; the rest of the batch continues.
    pub fn transform_batch<'a>(
        &self,
        kind: &str,
        rows: impl IntoIterator<Item = &'a RawRecord>,
        run: &RunIdentity,
        ctx: &TransformContext,
        registry_override: Option<&MapperRegistry>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for raw in rows {
            match self.transform(kind, raw, run, ctx, registry_override) {
                Ok(envelope) => outcome.envelopes.push(envelope),
                Err(failure) => {
                    failure.report();
                    if failure.is_unknown_kind() {
                        outcome.unknown_kind += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
            }
        }
        debug!(
            kind = kind,
            transformed = outcome.envelopes.len(),
            skipped = outcome.skipped(),
            "Transformed batch"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttributeSet, EntityStatus, RawValue};

    fn run() -> RunIdentity {
        RunIdentity::new("wf-1", "run-1")
    }

    fn ctx() -> TransformContext {
        TransformContext::new("conn1", "warehouse")
    }

    fn orders_table() -> RawRecord {
        RawRecord::new()
            .with("table_name", "orders")
            .with("table_schema", "public")
            .with("table_catalog", "shop")
            .with("estimated_row_count", 120i64)
    }

    #[test]
    fn test_table_scenario() {
        let t = Transformer::with_builtins();
        let env = t
            .transform("TABLE", &orders_table(), &run(), &ctx(), None)
            .unwrap();
        assert_eq!(env.type_name(), &EntityKind::TABLE);
        assert_eq!(env.name(), Some("orders"));
        assert_eq!(env.qualified_name(), Some("conn1/shop/public/orders"));
        assert_eq!(
            env.custom_attributes()["estimated_row_count"],
            RawValue::Int(120)
        );
        assert_eq!(
            env.attributes()["connectionQualifiedName"],
            RawValue::from("conn1")
        );
        assert_eq!(env.attributes()[LAST_SYNC_WORKFLOW], RawValue::from("wf-1"));
        assert_eq!(env.attributes()[LAST_SYNC_RUN], RawValue::from("run-1"));
        assert_eq!(env.status(), EntityStatus::Active);
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let t = Transformer::with_builtins();
        let upper = t.transform("TABLE", &orders_table(), &run(), &ctx(), None).unwrap();
        let lower = t.transform("table", &orders_table(), &run(), &ctx(), None).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let t = Transformer::with_builtins();
        let raw = orders_table();
        let first = t.transform("TABLE", &raw, &run(), &ctx(), None).unwrap();
        let second = t.transform("TABLE", &raw, &run(), &ctx(), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(raw, orders_table());
    }

    #[test]
    fn test_data_quality_scenario() {
        let t = Transformer::with_builtins();
        let raw = RawRecord::new()
            .with("schemaname", "public")
            .with("tablename", "orders");
        let env = t.transform("data_quality", &raw, &run(), &ctx(), None).unwrap();
        assert_eq!(env.name(), Some("public.orders_quality"));
    }

    #[test]
    fn test_unknown_kind_is_recoverable() {
        let t = Transformer::with_builtins();
        let err = t
            .transform("bogus", &orders_table(), &run(), &ctx(), None)
            .unwrap_err();
        assert!(err.is_unknown_kind());
        assert!(err.to_string().contains("BOGUS"));
        assert!(t.transform_row("bogus", &orders_table(), &run(), &ctx()).is_none());
    }

    #[test]
    fn test_batch_continues_past_bad_row() {
        let t = Transformer::with_builtins();
        let bad = orders_table().with("estimated_row_count", vec!["not", "a", "number"]);
        let rows = vec![orders_table(), bad, orders_table().with("table_name", "items")];

        let outcome = t.transform_batch("TABLE", &rows, &run(), &ctx(), None);
        assert_eq!(outcome.envelopes.len(), 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.unknown_kind, 0);
        assert_eq!(outcome.envelopes[1].name(), Some("items"));
    }

    #[test]
    fn test_mapper_failure_carries_record() {
        let t = Transformer::with_builtins();
        let bad = orders_table().with("estimated_row_count", "lots");
        let err = t.transform("TABLE", &bad, &run(), &ctx(), None).unwrap_err();
        let record = err.record().unwrap();
        assert_eq!(record.get("estimated_row_count"), Some(&RawValue::from("lots")));
        assert_eq!(
            record.get(CONNECTION_QUALIFIED_NAME),
            Some(&RawValue::from("conn1"))
        );
    }

    #[test]
    fn test_all_defaults_envelope() {
        let t = Transformer::with_builtins();
        for kind in EntityKind::builtins() {
            let env = t
                .transform(kind.as_str(), &RawRecord::new(), &run(), &ctx(), None)
                .unwrap();
            assert!(env.name().is_some(), "{} has no name", kind);
            assert!(env.qualified_name().is_some(), "{} has no qualifiedName", kind);
            for key in env.attributes().keys() {
                assert!(
                    !env.custom_attributes().contains_key(key),
                    "{}: {} in both sets",
                    kind,
                    key
                );
            }
        }
    }

    #[test]
    fn test_override_applies_to_one_call() {
        let t = Transformer::with_builtins();
        let mut custom = MapperRegistry::new();
        custom.register(
            EntityKind::TABLE,
            |raw: &RawRecord| -> std::result::Result<AttributeSet, MapError> {
                let name = raw.get("table_name").map(|v| v.to_string()).unwrap_or_default();
                Ok(AttributeSet::new()
                    .attr("name", name.to_uppercase())
                    .attr("qualifiedName", name))
            },
        );

        let overridden = t
            .transform("TABLE", &orders_table(), &run(), &ctx(), Some(&custom))
            .unwrap();
        assert_eq!(overridden.name(), Some("ORDERS"));

        let default = t.transform("TABLE", &orders_table(), &run(), &ctx(), None).unwrap();
        assert_eq!(default.name(), Some("orders"));
        assert!(t.transform("SCHEMA", &RawRecord::new(), &run(), &ctx(), Some(&custom)).is_err());
    }

    #[test]
    fn test_mapper_without_identity_is_rejected() {
        let mut t = Transformer::with_builtins();
        t.registry_mut().register(
            "view",
            |_: &RawRecord| -> std::result::Result<AttributeSet, MapError> {
                Ok(AttributeSet::new().custom("x", 1i64))
            },
        );
        let err = t.transform("view", &RawRecord::new(), &run(), &ctx(), None).unwrap_err();
        assert!(!err.is_unknown_kind());
    }

    #[test]
    fn test_overlapping_attribute_sets_are_rejected() {
        let mut t = Transformer::with_builtins();
        t.registry_mut().register(
            "view",
            |_: &RawRecord| -> std::result::Result<AttributeSet, MapError> {
                Ok(AttributeSet::new()
                    .attr("name", "v")
                    .attr("qualifiedName", "c/db/s/v")
                    .custom("name", "dup")
                    .custom(LAST_SYNC_RUN, "shadow"))
            },
        );
        let raw = RawRecord::new().with("view_name", "v");
        let err = t.transform("view", &raw, &run(), &ctx(), None).unwrap_err();
        match &err {
            TransformFailure::Mapper {
                source: MapError::Invalid(message),
                ..
            } => {
                assert!(message.contains("lastSyncRun"));
                assert!(message.contains("name"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.record().and_then(|r| r.get("view_name")), Some(&RawValue::from("v")));

        let outcome = t.transform_batch("view", [&raw], &run(), &ctx(), None);
        assert!(outcome.envelopes.is_empty());
        assert_eq!(outcome.failed, 1);
    }
}

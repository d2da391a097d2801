//! Mapper registry keyed by entity kind.
//!
//! The [`MapperRegistry`] is built once, optionally customized, and then
//! only read. A transformer owns one as its default; callers can hand a
//! different registry to a single transform call without touching it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{AttributeSet, EntityKind, RawRecord};
use crate::error::{ExtractError, Result};

use super::error::MapError;
use super::mappers;

/// Converts one raw record into catalog and custom attributes.
///
/// Implementations must be pure: no I/O, no logging, same output for the
/// same input. Any `Fn(&RawRecord) -> Result<AttributeSet, MapError>`
/// qualifies, so plain functions register directly.
pub trait AttributeMapper: Send + Sync {
    fn map(&self, raw: &RawRecord) -> std::result::Result<AttributeSet, MapError>;
}

impl<F> AttributeMapper for F
where
    F: Fn(&RawRecord) -> std::result::Result<AttributeSet, MapError> + Send + Sync,
{
    fn map(&self, raw: &RawRecord) -> std::result::Result<AttributeSet, MapError> {
        self(raw)
    }
}

/// Registry of attribute mappers by entity kind.
#[derive(Default, Clone)]
pub struct MapperRegistry {
    mappers: HashMap<EntityKind, Arc<dyn AttributeMapper>>,
}

impl MapperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the six PostgreSQL mappers registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EntityKind::DATABASE, mappers::map_database);
        registry.register(EntityKind::SCHEMA, mappers::map_schema);
        registry.register(EntityKind::TABLE, mappers::map_table);
        registry.register(EntityKind::COLUMN, mappers::map_column);
        registry.register(EntityKind::FOREIGN_KEY, mappers::map_foreign_key);
        registry.register(EntityKind::DATA_QUALITY, mappers::map_data_quality);
        registry
    }

    /// Register a mapper, replacing any existing one for the kind.
    pub fn register(&mut self, kind: impl Into<EntityKind>, mapper: impl AttributeMapper + 'static) {
        self.mappers.insert(kind.into(), Arc::new(mapper));
    }

    /// Register a shared mapper.
    pub fn register_arc(&mut self, kind: impl Into<EntityKind>, mapper: Arc<dyn AttributeMapper>) {
        self.mappers.insert(kind.into(), mapper);
    }

    /// Remove the mapper for a kind, returning it if present.
    pub fn remove(&mut self, kind: &EntityKind) -> Option<Arc<dyn AttributeMapper>> {
        self.mappers.remove(kind)
    }

    /// Get the mapper for a kind.
    pub fn get(&self, kind: &EntityKind) -> Option<Arc<dyn AttributeMapper>> {
        self.mappers.get(kind).cloned()
    }

    /// Get the mapper for a kind, returning an error if none is registered.
    pub fn require(&self, kind: &EntityKind) -> Result<Arc<dyn AttributeMapper>> {
        self.get(kind)
            .ok_or_else(|| ExtractError::Config(format!("No mapper registered for kind: {}", kind)))
    }

    /// Check if a kind has a mapper.
    pub fn contains(&self, kind: &EntityKind) -> bool {
        self.mappers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&EntityKind> {
        let mut kinds: Vec<_> = self.mappers.keys().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;

    struct ConstantMapper(&'static str);

    impl AttributeMapper for ConstantMapper {
        fn map(&self, _raw: &RawRecord) -> std::result::Result<AttributeSet, MapError> {
            Ok(AttributeSet::new()
                .attr("name", self.0)
                .attr("qualifiedName", self.0))
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = MapperRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(&EntityKind::TABLE).is_none());
        assert!(registry.require(&EntityKind::TABLE).is_err());
    }

    #[test]
    fn test_builtins() {
        let registry = MapperRegistry::with_builtins();
        assert_eq!(registry.len(), 6);
        for kind in EntityKind::builtins() {
            assert!(registry.contains(&kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_register_custom_kind() {
        let mut registry = MapperRegistry::new();
        registry.register("view", ConstantMapper("v"));
        let mapper = registry.require(&EntityKind::new("VIEW")).unwrap();
        let set = mapper.map(&RawRecord::new()).unwrap();
        assert_eq!(set.attributes["name"], RawValue::from("v"));
    }

    #[test]
    fn test_register_closure_replaces() {
        let mut registry = MapperRegistry::with_builtins();
        registry.register(
            EntityKind::TABLE,
            |_: &RawRecord| -> std::result::Result<AttributeSet, MapError> {
                Err(MapError::Invalid("disabled".into()))
            },
        );
        assert_eq!(registry.len(), 6);
        let mapper = registry.require(&EntityKind::TABLE).unwrap();
        assert!(mapper.map(&RawRecord::new()).is_err());
    }

    #[test]
    fn test_register_arc_and_remove() {
        let mut registry = MapperRegistry::new();
        let shared: Arc<dyn AttributeMapper> = Arc::new(ConstantMapper("x"));
        registry.register_arc(EntityKind::SCHEMA, shared.clone());
        registry.register_arc(EntityKind::DATABASE, shared);
        assert_eq!(
            registry.kinds(),
            vec![&EntityKind::DATABASE, &EntityKind::SCHEMA]
        );
        assert!(registry.remove(&EntityKind::SCHEMA).is_some());
        assert!(!registry.contains(&EntityKind::SCHEMA));
    }

    #[test]
    fn test_debug_lists_kinds() {
        let mut registry = MapperRegistry::new();
        registry.register(EntityKind::COLUMN, ConstantMapper("c"));
        let debug = format!("{:?}", registry);
        assert!(debug.contains("MapperRegistry"));
        assert!(debug.contains("COLUMN"));
    }
}

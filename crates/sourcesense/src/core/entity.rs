//! Attribute sets and entity envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::kind::EntityKind;
use super::value::RawValue;

/// Ordered attribute map. Ordering keeps serialized envelopes byte-stable.
pub type Attributes = BTreeMap<String, RawValue>;

/// Output of an attribute mapper.
///
/// `attributes` holds the catalog's first-class fields (identity and a few
/// kind-specific ones); `custom_attributes` holds everything else. A key
/// never appears in both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub attributes: Attributes,
    pub custom_attributes: Attributes,
}

impl AttributeSet {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a catalog attribute.
    #[must_use]
    pub fn attr(mut self, key: &str, value: impl Into<RawValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Add a custom attribute.
    #[must_use]
    pub fn custom(mut self, key: &str, value: impl Into<RawValue>) -> Self {
        self.custom_attributes.insert(key.to_string(), value.into());
        self
    }

    /// Merge another set into this one. Keys from `other` win.
    pub fn merge(&mut self, other: AttributeSet) {
        self.attributes.extend(other.attributes);
        self.custom_attributes.extend(other.custom_attributes);
    }

    /// Whether the catalog-required identity fields are present.
    pub fn has_identity(&self) -> bool {
        self.attributes.contains_key("name") && self.attributes.contains_key("qualifiedName")
    }

    /// Keys present in both maps. Empty for a well-formed set.
    pub fn overlapping_keys(&self) -> Vec<&str> {
        self.attributes
            .keys()
            .filter(|k| self.custom_attributes.contains_key(k.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Lifecycle status of an envelope in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    #[default]
    Active,
    Deleted,
}

/// The unit handed to the catalog sink.
///
/// Built once per accepted row and never mutated afterwards; fields are only
/// readable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEnvelope {
    type_name: EntityKind,
    attributes: Attributes,
    custom_attributes: Attributes,
    status: EntityStatus,
}

impl EntityEnvelope {
    /// Assemble an active envelope from a kind and its attributes.
    pub fn active(kind: EntityKind, set: AttributeSet) -> Self {
        Self {
            type_name: kind,
            attributes: set.attributes,
            custom_attributes: set.custom_attributes,
            status: EntityStatus::Active,
        }
    }

    pub fn type_name(&self) -> &EntityKind {
        &self.type_name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn custom_attributes(&self) -> &Attributes {
        &self.custom_attributes
    }

    pub fn status(&self) -> EntityStatus {
        self.status
    }

    /// Entity name (`attributes.name`).
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(RawValue::as_str)
    }

    /// Entity identity key (`attributes.qualifiedName`).
    pub fn qualified_name(&self) -> Option<&str> {
        self.attributes.get("qualifiedName").and_then(RawValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_json_shape() {
        let set = AttributeSet::new()
            .attr("name", "orders")
            .attr("qualifiedName", "c/db/s/orders")
            .custom("estimated_row_count", 120i64);
        let envelope = EntityEnvelope::active(EntityKind::TABLE, set);

        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            json,
            r#"{"typeName":"TABLE","attributes":{"name":"orders","qualifiedName":"c/db/s/orders"},"customAttributes":{"estimated_row_count":120},"status":"ACTIVE"}"#
        );
        assert_eq!(envelope.name(), Some("orders"));
        assert_eq!(envelope.qualified_name(), Some("c/db/s/orders"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = AttributeSet::new().attr("a", 1i64).custom("x", "old");
        base.merge(AttributeSet::new().attr("b", 2i64).custom("x", "new"));
        assert_eq!(base.attributes.len(), 2);
        assert_eq!(base.custom_attributes.get("x"), Some(&RawValue::from("new")));
    }

    #[test]
    fn test_identity_and_overlap() {
        let set = AttributeSet::new().attr("name", "n").custom("name", "dup");
        assert!(!set.has_identity());
        assert_eq!(set.overlapping_keys(), vec!["name"]);
    }
}

//! Entity kind labels.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog type label assigned to a transformed record.
///
/// The set is open: registries may add kinds beyond the built-in ones.
/// Labels are always stored in canonical form (upper case, `_` as word
/// separator), so `"foreign-key"`, `"Foreign Key"` and `"FOREIGN_KEY"` are
/// the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    pub const DATABASE: EntityKind = EntityKind(Cow::Borrowed("DATABASE"));
    pub const SCHEMA: EntityKind = EntityKind(Cow::Borrowed("SCHEMA"));
    pub const TABLE: EntityKind = EntityKind(Cow::Borrowed("TABLE"));
    pub const COLUMN: EntityKind = EntityKind(Cow::Borrowed("COLUMN"));
    pub const FOREIGN_KEY: EntityKind = EntityKind(Cow::Borrowed("FOREIGN_KEY"));
    pub const DATA_QUALITY: EntityKind = EntityKind(Cow::Borrowed("DATA_QUALITY"));

    /// Create a kind from any label, normalizing it to canonical form.
    pub fn new(label: &str) -> Self {
        EntityKind(Cow::Owned(Self::normalize(label)))
    }

    /// Canonical form of a label: trimmed, upper case, `-` and spaces as `_`.
    pub fn normalize(label: &str) -> String {
        label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }

    /// The built-in kinds, in hierarchy order.
    pub fn builtins() -> [EntityKind; 6] {
        [
            Self::DATABASE,
            Self::SCHEMA,
            Self::TABLE,
            Self::COLUMN,
            Self::FOREIGN_KEY,
            Self::DATA_QUALITY,
        ]
    }

    /// Canonical label.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case label, used for output partition names.
    pub fn partition_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(label: &str) -> Self {
        EntityKind::new(label)
    }
}

impl From<String> for EntityKind {
    fn from(label: String) -> Self {
        EntityKind::new(&label)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.0.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_case_insensitive() {
        assert_eq!(EntityKind::new("table"), EntityKind::TABLE);
        assert_eq!(EntityKind::new(" Table "), EntityKind::TABLE);
        assert_eq!(EntityKind::new("foreign-key"), EntityKind::FOREIGN_KEY);
        assert_eq!(EntityKind::new("data quality"), EntityKind::DATA_QUALITY);
    }

    #[test]
    fn test_unknown_labels_are_kept() {
        let kind = EntityKind::new("bogus");
        assert_eq!(kind.as_str(), "BOGUS");
        assert!(!EntityKind::builtins().contains(&kind));
    }

    #[test]
    fn test_serde_round_trip_normalizes() {
        let kind: EntityKind = serde_json::from_str("\"column\"").unwrap();
        assert_eq!(kind, EntityKind::COLUMN);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"COLUMN\"");
    }

    #[test]
    fn test_partition_name() {
        assert_eq!(EntityKind::FOREIGN_KEY.partition_name(), "foreign_key");
    }
}

//! Row-level transform failures.

use thiserror::Error;
use tracing::{error, warn};

use crate::core::{EntityKind, RawRecord, RawValue};

/// Failure raised by an attribute mapper for one row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// A present field could not be coerced to the type the mapper expects.
    #[error("field '{field}': expected {expected}, found {found}")]
    Coercion {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// Mapper-specific validation failure.
    #[error("{0}")]
    Invalid(String),
}

impl MapError {
    /// Create a coercion error for `field` holding `value`.
    pub fn coercion(field: &str, expected: &'static str, value: &RawValue) -> Self {
        let mut shown = value.to_string();
        if shown.len() > 64 {
            let mut cut = 64;
            while !shown.is_char_boundary(cut) {
                cut -= 1;
            }
            shown.truncate(cut);
            shown.push_str("...");
        }
        MapError::Coercion {
            field: field.to_string(),
            expected,
            found: format!("{} {:?}", value.type_name(), shown),
        }
    }
}

/// Why a row produced no envelope.
///
/// Both variants are recoverable: the row is skipped and the batch
/// continues.
#[derive(Error, Debug, Clone)]
pub enum TransformFailure {
    /// No mapper is registered for the kind.
    #[error("Unknown entity kind: {kind}")]
    UnknownKind { kind: EntityKind },

    /// The mapper rejected the row.
    #[error("Error transforming {kind} entity: {source}")]
    Mapper {
        kind: EntityKind,
        #[source]
        source: MapError,
        record: RawRecord,
    },
}

impl TransformFailure {
    /// The kind the row was transformed as.
    pub fn kind(&self) -> &EntityKind {
        match self {
            TransformFailure::UnknownKind { kind } | TransformFailure::Mapper { kind, .. } => kind,
        }
    }

    /// The offending record, for mapper failures.
    pub fn record(&self) -> Option<&RawRecord> {
        match self {
            TransformFailure::UnknownKind { .. } => None,
            TransformFailure::Mapper { record, .. } => Some(record),
        }
    }

    /// Whether this failure is an unknown kind.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, TransformFailure::UnknownKind { .. })
    }

    /// Emit the diagnostic for this failure.
    pub fn report(&self) {
        match self {
            TransformFailure::UnknownKind { kind } => {
                error!(kind = %kind, "Unknown typename: {}", kind);
            }
            TransformFailure::Mapper {
                kind,
                source,
                record,
            } => {
                warn!(
                    kind = %kind,
                    data = %record.to_json_string(),
                    "Error transforming {} entity: {}",
                    kind,
                    source
                );
            }
        }
    }
}

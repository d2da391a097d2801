//! Core data model shared by the transformer and the extraction layer.
//!
//! - [`value`]: loosely typed row values and records
//! - [`kind`]: entity kind labels
//! - [`qualified_name`]: hierarchical identity strings
//! - [`entity`]: attribute sets and the envelope handed to the sink

pub mod entity;
pub mod kind;
pub mod qualified_name;
pub mod value;

pub use entity::{AttributeSet, Attributes, EntityEnvelope, EntityStatus};
pub use kind::EntityKind;
pub use qualified_name::{build_qualified_name, SEPARATOR};
pub use value::{parse_pg_array, RawRecord, RawValue};

//! # sourcesense
//!
//! PostgreSQL metadata extraction for catalog ingestion.
//!
//! The library queries a PostgreSQL instance for its structural metadata and
//! turns every returned row into a catalog entity envelope:
//!
//! - **Transformer**: maps raw rows of six kinds (database, schema, table,
//!   column, foreign key, data quality) to envelopes through a pluggable
//!   mapper registry
//! - **Qualified names** built from the connection down to the column
//! - **Extraction activity** streaming query results in batches into raw
//!   and transformed partitions
//! - **Orchestrator** running the configured steps concurrently
//!
//! ## Example
//!
//! ```rust,no_run
//! use sourcesense::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sourcesense::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(None).await?;
//!     println!("Extracted {} entities", result.total_record_count);
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod queries;
pub mod source;
pub mod transform;

// Re-exports for convenient access
pub use activity::{ActivityStatistics, ExtractionActivity, ExtractionStep, FileSink, OutputSink};
pub use config::{Config, ExtractionConfig, SourceConfig};
pub use crate::core::{
    build_qualified_name, AttributeSet, EntityEnvelope, EntityKind, RawRecord, RawValue,
};
pub use error::{ExtractError, Result};
pub use orchestrator::{
    ExtractionResult, HealthCheckResult, Orchestrator, PreflightResult, SchemaRef,
};
pub use queries::QuerySet;
pub use source::{DataSource, PgDataSource};
pub use transform::{
    AttributeMapper, MapError, MapperRegistry, RunIdentity, TransformContext, TransformFailure,
    Transformer,
};

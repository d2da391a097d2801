//! Extraction orchestrator - runs every configured step for one run.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::activity::{prepare_query, ActivityStatistics, ExtractionActivity, FileSink, OutputSink};
use crate::config::Config;
use crate::core::{RawRecord, RawValue};
use crate::error::{ExtractError, Result};
use crate::queries::{QuerySet, METADATA_SQL, TABLES_CHECK_SQL};
use crate::source::{DataSource, PgDataSource};
use crate::transform::Transformer;

/// Extraction orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn DataSource>,
    sink: Arc<dyn OutputSink>,
    transformer: Arc<Transformer>,
    queries: QuerySet,
}

/// A step that did not complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStep {
    pub step: String,
    pub error: String,
}

/// Result of an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub workflow_id: String,

    /// Unique run identifier.
    pub run_id: String,

    /// `completed`, `partial` or `failed`.
    pub status: String,

    /// Hash of the configuration the run used.
    pub config_hash: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    pub steps_total: usize,
    pub steps_success: usize,
    pub steps_failed: usize,

    /// Envelopes written across all steps.
    pub total_record_count: u64,

    /// Rows skipped by the transformer across all steps.
    pub failed_record_count: u64,

    pub bytes_written: u64,

    /// Statistics of the completed steps, in configured order.
    pub steps: Vec<ActivityStatistics>,

    pub failed_steps: Vec<FailedStep>,
}

impl ExtractionResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_success(&self) -> bool {
        self.steps_failed == 0
    }
}

/// Result of probing the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source: String,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub healthy: bool,
}

/// A catalog/schema pair selected by the configured filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    pub catalog_name: String,
    pub schema_name: String,
}

/// What the configured filters select, checked before extracting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightResult {
    /// Tables passing the include/exclude and table-name filters.
    pub table_count: u64,
    pub schemas: Vec<SchemaRef>,
}

impl PreflightResult {
    /// Passes when the filters select at least one table.
    pub fn is_ok(&self) -> bool {
        self.table_count > 0
    }
}

impl Orchestrator {
    /// Create an orchestrator connected to the configured PostgreSQL source,
    /// writing partitions under `extraction.output_dir`.
    pub async fn new(config: Config) -> Result<Self> {
        let source = PgDataSource::new(&config.source)?;
        info!("Using PostgreSQL source: {}", source.name());
        let sink = FileSink::new(&config.extraction.output_dir);
        Self::with_parts(config, Arc::new(source), Arc::new(sink))
    }

    /// Create an orchestrator over an explicit source and sink.
    pub fn with_parts(
        config: Config,
        source: Arc<dyn DataSource>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        config.validate()?;
        let queries = QuerySet::load(config.extraction.queries_dir.as_deref())?;
        Ok(Self {
            config,
            source,
            sink,
            transformer: Arc::new(Transformer::with_builtins()),
            queries,
        })
    }

    /// Replace the transformer (for custom mapper registries).
    #[must_use]
    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Arc::new(transformer);
        self
    }

    /// Replace the query set.
    #[must_use]
    pub fn with_queries(mut self, queries: QuerySet) -> Self {
        self.queries = queries;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every configured step.
    ///
    /// Steps run concurrently up to `extraction.concurrency`. A failed step
    /// is recorded and the others continue. Cancellation stops new steps from
    /// starting; steps already running finish.
    pub async fn run(&self, cancel: Option<CancellationToken>) -> Result<ExtractionResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let cancel = cancel.unwrap_or_else(CancellationToken::new);

        let run = self.config.workflow.run_identity();
        let steps = self.queries.steps(&self.config.extraction.step_kinds())?;
        info!(
            "Starting extraction run {} (workflow {})",
            run.workflow_run_id, run.workflow_id
        );

        // Fail fast before any step touches its partitions
        self.source.check_live().await?;

        let activity = Arc::new(
            ExtractionActivity::new(
                self.source.clone(),
                self.sink.clone(),
                self.transformer.clone(),
                run.clone(),
                self.config.transform_context(),
            )
            .with_parameters(self.config.query_parameters(&run))
            .with_batch_size(self.config.extraction.batch_size),
        );

        let concurrency = self.config.extraction.concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        info!(
            "Running {} steps with concurrency {}",
            steps.len(),
            concurrency
        );

        let mut handles = Vec::with_capacity(steps.len());
        for step in steps {
            if cancel.is_cancelled() {
                info!("Cancellation requested, not starting remaining steps");
                break;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|e| ExtractError::step(step.name(), e.to_string()))?,
                _ = cancel.cancelled() => {
                    info!("Cancellation requested, not starting remaining steps");
                    break;
                }
            };

            let activity = activity.clone();
            let name = step.name();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                activity.execute_step(&step).await
            });
            handles.push((name, handle));
        }

        let steps_total = self.config.extraction.steps.len();
        let mut completed = Vec::new();
        let mut failed_steps = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(stats)) => completed.push(stats),
                Ok(Err(e)) => {
                    error!(step = %name, "Step failed: {}", e);
                    failed_steps.push(FailedStep {
                        step: name,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(step = %name, "Step task failed: {}", e);
                    failed_steps.push(FailedStep {
                        step: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() && completed.len() + failed_steps.len() < steps_total {
            warn!(
                "Extraction cancelled after {} of {} steps",
                completed.len() + failed_steps.len(),
                steps_total
            );
            return Err(ExtractError::Cancelled);
        }

        let completed_at = Utc::now();
        let status = if failed_steps.is_empty() {
            "completed"
        } else if completed.is_empty() {
            "failed"
        } else {
            "partial"
        };

        let result = ExtractionResult {
            workflow_id: run.workflow_id,
            run_id: run.workflow_run_id,
            status: status.to_string(),
            config_hash: self.config.hash(),
            started_at,
            completed_at,
            duration_seconds: start.elapsed().as_secs_f64(),
            steps_total,
            steps_success: completed.len(),
            steps_failed: failed_steps.len(),
            total_record_count: completed.iter().map(|s| s.total_record_count).sum(),
            failed_record_count: completed.iter().map(|s| s.failed_record_count).sum(),
            bytes_written: completed.iter().map(|s| s.bytes_written).sum(),
            steps: completed,
            failed_steps,
        };

        info!(
            "Extraction {}: {}/{} steps, {} entities ({} rows skipped) in {:.1}s",
            result.status,
            result.steps_success,
            result.steps_total,
            result.total_record_count,
            result.failed_record_count,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Probe the source: liveness, latency and server version.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let probe = match self.source.check_live().await {
            Ok(()) => self.source.server_version().await,
            Err(e) => Err(e),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let result = match probe {
            Ok(version) => HealthCheckResult {
                source: self.source.name().to_string(),
                connected: true,
                latency_ms,
                server_version: Some(version),
                error: None,
                healthy: true,
            },
            Err(e) => HealthCheckResult {
                source: self.source.name().to_string(),
                connected: false,
                latency_ms,
                server_version: None,
                error: Some(e.to_string()),
                healthy: false,
            },
        };
        Ok(result)
    }

    /// Check what the configured filters select: the number of matching
    /// tables and the catalog/schema pairs.
    pub async fn preflight(&self) -> Result<PreflightResult> {
        self.source.check_live().await?;
        let table_count = self.count_tables().await?;
        let schemas = self.list_schemas().await?;
        info!(
            "Preflight: {} tables in {} schemas match the filters",
            table_count,
            schemas.len()
        );
        Ok(PreflightResult {
            table_count,
            schemas,
        })
    }

    /// Number of tables that pass the include/exclude and table-name filters.
    pub async fn count_tables(&self) -> Result<u64> {
        let rows = self.fetch_all(TABLES_CHECK_SQL).await?;
        let count = rows.first().and_then(|row| row.get("table_count"));
        match count {
            None | Some(RawValue::Null) => Ok(0),
            Some(RawValue::Int(n)) => Ok((*n).max(0) as u64),
            Some(RawValue::Text(s)) => s.trim().parse().map_err(|_| {
                ExtractError::step("preflight", format!("invalid table count: {}", s))
            }),
            Some(other) => Err(ExtractError::step(
                "preflight",
                format!("invalid table count: {}", other),
            )),
        }
    }

    /// Catalog/schema pairs selected by the include/exclude filters.
    pub async fn list_schemas(&self) -> Result<Vec<SchemaRef>> {
        let rows = self.fetch_all(METADATA_SQL).await?;
        Ok(rows
            .iter()
            .map(|row| SchemaRef {
                catalog_name: text_field(row, "catalog_name"),
                schema_name: text_field(row, "schema_name"),
            })
            .collect())
    }

    /// Bind the run parameters into `template` and collect every row.
    async fn fetch_all(&self, template: &str) -> Result<Vec<RawRecord>> {
        let run = self.config.workflow.run_identity();
        let sql = prepare_query(template, &self.config.query_parameters(&run))?;
        let mut rx = self
            .source
            .stream_query(&sql, self.config.extraction.batch_size);
        let mut rows = Vec::new();
        while let Some(batch) = rx.recv().await {
            rows.extend(batch?);
        }
        Ok(rows)
    }

    /// Release the source's connections.
    pub async fn close(&self) {
        self.source.close().await;
    }
}

fn text_field(row: &RawRecord, key: &str) -> String {
    match row.get(key) {
        None | Some(RawValue::Null) => String::new(),
        Some(value) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemorySink;
    use crate::core::{EntityKind, RawRecord};
    use crate::source::MemorySource;

    fn config(steps: &[&str]) -> Config {
        let yaml = format!(
            r#"
source:
  host: localhost
  database: shop
  user: postgres
connection:
  qualified_name: conn1
  name: shop
workflow:
  workflow_id: wf
  workflow_run_id: run-1
extraction:
  concurrency: 2
  steps: [{}]
"#,
            steps.join(", ")
        );
        Config::from_yaml(&yaml).unwrap()
    }

    fn queries() -> QuerySet {
        let mut queries = QuerySet::default();
        queries.insert(EntityKind::TABLE, "SELECT * FROM tables WHERE db = '{database_name}'");
        queries.insert(EntityKind::SCHEMA, "SELECT * FROM schemas");
        queries.insert(EntityKind::COLUMN, "SELECT * FROM columns");
        queries
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_rows(
                "FROM tables",
                vec![RawRecord::new()
                    .with("table_catalog", "shop")
                    .with("table_schema", "public")
                    .with("table_name", "orders")],
            )
            .with_rows(
                "FROM schemas",
                vec![RawRecord::new()
                    .with("default_character_set_catalog", "shop")
                    .with("schema_name", "public")],
            )
            .with_failure("FROM columns", "permission denied for pg_stats")
    }

    #[tokio::test]
    async fn test_run_collects_statistics() {
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::with_parts(
            config(&["table", "schema"]),
            Arc::new(source()),
            sink.clone(),
        )
        .unwrap()
        .with_queries(queries());

        let result = orchestrator.run(None).await.unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.run_id, "run-1");
        assert_eq!(result.steps_success, 2);
        assert_eq!(result.total_record_count, 2);
        assert_eq!(result.steps[0].typename, "table");
        assert_eq!(result.steps[1].typename, "schema");

        let tables = sink.lines("transformed/table").unwrap();
        assert!(tables[0].contains("\"lastSyncRun\":\"run-1\""));
        assert!(result.to_json().unwrap().contains("\"status\": \"completed\""));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_others() {
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::with_parts(
            config(&["table", "column"]),
            Arc::new(source()),
            sink.clone(),
        )
        .unwrap()
        .with_queries(queries());

        let result = orchestrator.run(None).await.unwrap();
        assert_eq!(result.status, "partial");
        assert!(!result.is_success());
        assert_eq!(result.failed_steps.len(), 1);
        assert_eq!(result.failed_steps[0].step, "column");
        assert!(sink.lines("transformed/table").is_some());
        assert!(sink.lines("transformed/column").is_none());
    }

    #[tokio::test]
    async fn test_disconnected_source_fails_run() {
        let orchestrator = Orchestrator::with_parts(
            config(&["table"]),
            Arc::new(source().disconnected()),
            Arc::new(MemorySink::new()),
        )
        .unwrap()
        .with_queries(queries());

        let err = orchestrator.run(None).await.unwrap_err();
        assert!(matches!(err, ExtractError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let orchestrator = Orchestrator::with_parts(
            config(&["table", "schema"]),
            Arc::new(source()),
            Arc::new(MemorySink::new()),
        )
        .unwrap()
        .with_queries(queries());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator.run(Some(cancel)).await.unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
    }

    #[tokio::test]
    async fn test_health_check() {
        let healthy = Orchestrator::with_parts(
            config(&["table"]),
            Arc::new(MemorySource::new()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        let result = healthy.health_check().await.unwrap();
        assert!(result.healthy);
        assert!(result.server_version.is_some());

        let unhealthy = Orchestrator::with_parts(
            config(&["table"]),
            Arc::new(MemorySource::new().disconnected()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();
        let result = unhealthy.health_check().await.unwrap();
        assert!(!result.healthy);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_duplicate_steps_rejected() {
        let mut config = config(&["table"]);
        config.extraction.steps.push("TABLE".into());
        let err = Orchestrator::with_parts(
            config,
            Arc::new(source()),
            Arc::new(MemorySink::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExtractError::Config(_)));
        assert!(err.to_string().contains("duplicate step"));
    }

    fn preflight_source() -> MemorySource {
        MemorySource::new()
            .with_rows(
                "AS table_count",
                vec![RawRecord::new().with("table_count", 3i64)],
            )
            .with_rows(
                "FROM information_schema.schemata s",
                vec![
                    RawRecord::new()
                        .with("catalog_name", "shop")
                        .with("schema_name", "public"),
                    RawRecord::new()
                        .with("catalog_name", "shop")
                        .with("schema_name", "sales"),
                ],
            )
    }

    #[tokio::test]
    async fn test_preflight_counts_tables_and_lists_schemas() {
        let source = Arc::new(preflight_source());
        let orchestrator = Orchestrator::with_parts(
            config(&["table"]),
            source.clone(),
            Arc::new(MemorySink::new()),
        )
        .unwrap();

        let result = orchestrator.preflight().await.unwrap();
        assert!(result.is_ok());
        assert_eq!(result.table_count, 3);
        assert_eq!(
            result.schemas,
            vec![
                SchemaRef {
                    catalog_name: "shop".into(),
                    schema_name: "public".into(),
                },
                SchemaRef {
                    catalog_name: "shop".into(),
                    schema_name: "sales".into(),
                },
            ]
        );

        // Filters are bound into both queries
        let executed = source.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed.iter().all(|sql| !sql.contains('{')));
        assert!(executed[0].contains("~ '.*'"));
    }

    #[tokio::test]
    async fn test_preflight_with_no_matching_tables() {
        let orchestrator = Orchestrator::with_parts(
            config(&["table"]),
            Arc::new(
                MemorySource::new()
                    .with_rows("AS table_count", vec![RawRecord::new().with("table_count", 0i64)]),
            ),
            Arc::new(MemorySink::new()),
        )
        .unwrap();

        let result = orchestrator.preflight().await.unwrap();
        assert!(!result.is_ok());
        assert!(result.schemas.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_requires_live_source() {
        let orchestrator = Orchestrator::with_parts(
            config(&["table"]),
            Arc::new(preflight_source().disconnected()),
            Arc::new(MemorySink::new()),
        )
        .unwrap();

        let err = orchestrator.preflight().await.unwrap_err();
        assert!(matches!(err, ExtractError::NotConnected(_)));
    }
}

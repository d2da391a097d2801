//! Extraction activities.
//!
//! An activity runs one [`ExtractionStep`]: it checks the data source is
//! live, binds the run parameters into the step's query, streams the result
//! rows, transforms them and writes both the raw rows and the envelopes to
//! the step's output partitions. Re-running a step overwrites its partitions.

mod output;
mod query;

pub use output::{FileSink, MemorySink, OutputSink, PartitionWriter};
pub use query::prepare_query;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::core::EntityKind;
use crate::error::{ExtractError, Result};
use crate::source::DataSource;
use crate::transform::{RunIdentity, TransformContext, Transformer};

/// One unit of extraction: a kind and the query that yields its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionStep {
    pub kind: EntityKind,
    pub query: String,
}

impl ExtractionStep {
    pub fn new(kind: impl Into<EntityKind>, query: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            query: query.into(),
        }
    }

    /// Step name, the lower-case kind label.
    pub fn name(&self) -> String {
        self.kind.partition_name()
    }

    /// Partition receiving the untouched rows.
    pub fn raw_partition(&self) -> String {
        format!("raw/{}", self.name())
    }

    /// Partition receiving the envelopes.
    pub fn transformed_partition(&self) -> String {
        format!("transformed/{}", self.name())
    }
}

/// Statistics reported for one completed step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatistics {
    /// Lower-case kind label.
    pub typename: String,
    /// Partition holding the envelopes.
    pub partition: String,
    /// Rows that produced an envelope.
    pub total_record_count: u64,
    /// Rows skipped by the transformer.
    pub failed_record_count: u64,
    /// Rows returned by the query.
    pub raw_record_count: u64,
    /// Batches received from the source.
    pub chunk_count: u64,
    /// Bytes written across both partitions.
    pub bytes_written: u64,
    pub duration_ms: u64,
}

impl ActivityStatistics {
    fn new(step: &ExtractionStep) -> Self {
        Self {
            typename: step.name(),
            partition: step.transformed_partition(),
            ..Default::default()
        }
    }

    /// Rows per second over the step's duration.
    pub fn rows_per_second(&self) -> f64 {
        let secs = Duration::from_millis(self.duration_ms).as_secs_f64();
        if secs > 0.0 {
            self.total_record_count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Executes extraction steps against a bound data source.
pub struct ExtractionActivity {
    source: Arc<dyn DataSource>,
    sink: Arc<dyn OutputSink>,
    transformer: Arc<Transformer>,
    run: RunIdentity,
    context: TransformContext,
    parameters: BTreeMap<String, String>,
    batch_size: usize,
}

impl ExtractionActivity {
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn OutputSink>,
        transformer: Arc<Transformer>,
        run: RunIdentity,
        context: TransformContext,
    ) -> Self {
        Self {
            source,
            sink,
            transformer,
            run,
            context,
            parameters: BTreeMap::new(),
            batch_size: 1000,
        }
    }

    /// Placeholder values bound into every step's query.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Rows per batch requested from the source.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run one step.
    ///
    /// Fails fast when the source is not live or the query cannot be bound.
    /// Rows the transformer rejects are counted, not fatal. On failure
    /// nothing is committed, so partitions from an earlier run stay intact.
    pub async fn execute(&self, step: &ExtractionStep) -> Result<ActivityStatistics> {
        let start = Instant::now();
        let name = step.name();
        let mut stats = ActivityStatistics::new(step);

        if let Err(e) = self.source.check_live().await {
            error!(step = %name, "Data source {} is not live: {}", self.source.name(), e);
            return Err(e);
        }

        let sql = prepare_query(&step.query, &self.parameters)?;
        info!(step = %name, "Starting extraction step");
        debug!(step = %name, "Prepared query: {}", sql);

        let mut raw_out = self.sink.open(&step.raw_partition())?;
        let mut transformed_out = self.sink.open(&step.transformed_partition())?;

        let mut rx = self.source.stream_query(&sql, self.batch_size);
        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            stats.chunk_count += 1;
            stats.raw_record_count += batch.len() as u64;

            for raw in &batch {
                stats.bytes_written += raw_out.write_line(&raw.to_json_string())?;
            }

            let outcome = self.transformer.transform_batch(
                step.kind.as_str(),
                &batch,
                &self.run,
                &self.context,
                None,
            );
            for envelope in &outcome.envelopes {
                let line = serde_json::to_string(envelope)?;
                stats.bytes_written += transformed_out.write_line(&line)?;
            }
            stats.total_record_count += outcome.envelopes.len() as u64;
            stats.failed_record_count += outcome.skipped() as u64;

            debug!(
                step = %name,
                chunk = stats.chunk_count,
                rows = batch.len(),
                "Processed batch"
            );
        }

        raw_out.commit()?;
        transformed_out.commit()?;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            step = %name,
            records = stats.total_record_count,
            failed = stats.failed_record_count,
            chunks = stats.chunk_count,
            "Finished extraction step in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(stats)
    }

    /// Run one step, tagging any failure with the step name.
    pub async fn execute_step(&self, step: &ExtractionStep) -> Result<ActivityStatistics> {
        self.execute(step).await.map_err(|e| match e {
            ExtractError::NotConnected(_) | ExtractError::Cancelled => e,
            other => ExtractError::step(step.name(), other.to_string()),
        })
    }
}

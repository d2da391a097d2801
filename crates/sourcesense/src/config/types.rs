//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

use crate::core::EntityKind;

/// Detected system resources for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
            cpu_cores: sys.cpus().len(),
        }
    }

    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database to extract metadata from.
    pub source: SourceConfig,

    /// Catalog connection the extracted entities belong to.
    pub connection: ConnectionConfig,

    /// Workflow provenance attached to every entity.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Extraction behavior.
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Fill in auto-tuned values that were not set explicitly.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.extraction = self.extraction.with_auto_tuning(&resources);
        self
    }
}

/// Source database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (only "postgres" is supported).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Application name reported to the server (default: "sourcesense").
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Connection pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("application_name", &self.application_name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Catalog connection identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Root segment of every qualified name, e.g. `default/postgres/1700000000`.
    pub qualified_name: String,

    /// Display name of the connection.
    #[serde(default)]
    pub name: String,
}

/// Workflow identifiers recorded on every entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow identifier (default: "sourcesense-extraction").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,

    /// Run identifier. A fresh UUID is generated per run when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_run_id: Option<String>,
}

/// Extraction behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Directory receiving `raw/<kind>` and `transformed/<kind>` partitions.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Rows fetched per batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Steps run in parallel. Auto-tuned from CPU count if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Databases/schemas to include, matched against `catalog.schema`.
    #[serde(default = "default_include_regex")]
    pub include_regex: String,

    /// Databases/schemas to exclude, matched against `catalog.schema`.
    #[serde(default = "default_empty_regex")]
    pub exclude_regex: String,

    /// Tables to exclude by name (temporary tables and the like).
    #[serde(default = "default_empty_regex")]
    pub exclude_table_regex: String,

    /// Entity kinds to extract, in order (default: all built-in kinds).
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,

    /// Directory of `<kind>.sql` files overriding the built-in queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries_dir: Option<PathBuf>,

    /// Extra `{name}` placeholder values bound into every query.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            batch_size: default_batch_size(),
            concurrency: None,
            include_regex: default_include_regex(),
            exclude_regex: default_empty_regex(),
            exclude_table_regex: default_empty_regex(),
            steps: default_steps(),
            queries_dir: None,
            parameters: BTreeMap::new(),
        }
    }
}

impl ExtractionConfig {
    /// Fill in concurrency from the CPU count if unset.
    ///
    /// Half the cores, at least 1, and never more than the number of steps.
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        if self.concurrency.is_none() {
            let steps = self.steps.len().max(1);
            self.concurrency = Some((resources.cpu_cores / 2).clamp(1, steps));
        }
        self
    }

    /// Effective concurrency.
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(1).max(1)
    }

    /// Configured steps as entity kinds.
    pub fn step_kinds(&self) -> Vec<EntityKind> {
        self.steps.iter().map(|s| EntityKind::new(s)).collect()
    }
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_application_name() -> String {
    "sourcesense".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_batch_size() -> usize {
    1000
}

fn default_include_regex() -> String {
    ".*".to_string()
}

fn default_empty_regex() -> String {
    "^$".to_string()
}

fn default_steps() -> Vec<String> {
    EntityKind::builtins()
        .iter()
        .map(EntityKind::partition_name)
        .collect()
}

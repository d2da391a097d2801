//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio_postgres::Config as PgConfig;

use crate::error::Result;
use crate::transform::{RunIdentity, TransformContext};

/// Workflow identifier used when none is configured.
pub const DEFAULT_WORKFLOW_ID: &str = "sourcesense-extraction";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded with each run.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Connection context merged into every raw record.
    pub fn transform_context(&self) -> TransformContext {
        TransformContext::new(&self.connection.qualified_name, &self.connection.name)
    }

    /// Placeholder values bound into every extraction query.
    ///
    /// Built-in values are embedded in single-quoted SQL literals, so their
    /// quotes are doubled. User `parameters` are applied last, verbatim, and
    /// may override the built-in values.
    pub fn query_parameters(&self, run: &RunIdentity) -> BTreeMap<String, String> {
        let extraction = &self.extraction;
        let mut params = BTreeMap::new();
        params.insert("database_name".to_string(), sql_literal(&self.source.database));
        params.insert(
            "normalized_include_regex".to_string(),
            sql_literal(&extraction.include_regex),
        );
        params.insert(
            "normalized_exclude_regex".to_string(),
            sql_literal(&extraction.exclude_regex),
        );
        params.insert(
            "exclude_table_regex".to_string(),
            sql_literal(&extraction.exclude_table_regex),
        );
        params.insert(
            "temp_table_regex_sql".to_string(),
            temp_table_regex_sql(&extraction.exclude_table_regex),
        );
        params.insert("workflow_id".to_string(), sql_literal(&run.workflow_id));
        params.insert(
            "workflow_run_id".to_string(),
            sql_literal(&run.workflow_run_id),
        );
        params.extend(
            extraction
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }
}

fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Table-name filter clause, empty when nothing is excluded.
fn temp_table_regex_sql(exclude_table_regex: &str) -> String {
    if exclude_table_regex.is_empty() || exclude_table_regex == "^$" {
        String::new()
    } else {
        format!(
            "AND t.table_name !~ '{}'",
            sql_literal(exclude_table_regex)
        )
    }
}

impl SourceConfig {
    /// Build a tokio-postgres connection config.
    pub fn pg_config(&self) -> PgConfig {
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .application_name(&self.application_name)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        pg_config
    }

    /// `host:port/database`, for log lines.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl WorkflowConfig {
    /// Resolve the run identity, generating a run id if none is configured.
    ///
    /// Call once per run; every call without a configured id yields a new one.
    pub fn run_identity(&self) -> RunIdentity {
        RunIdentity::new(
            self.workflow_id
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKFLOW_ID.to_string()),
            self.workflow_run_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        )
    }
}

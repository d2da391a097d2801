//! In-memory data source.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::RawRecord;
use crate::error::{ExtractError, Result};

use super::{DataSource, STREAM_BUFFER};

enum Reply {
    Rows(Vec<RawRecord>),
    Fail(String),
}

/// Data source that answers queries from canned rows.
///
/// Each query is answered by the first registered entry whose marker occurs
/// in the SQL text; queries matching nothing return no rows. Every executed
/// query is recorded.
pub struct MemorySource {
    replies: Vec<(String, Reply)>,
    live: bool,
    executed: Mutex<Vec<String>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            live: true,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Answer queries containing `marker` with `rows`.
    #[must_use]
    pub fn with_rows(mut self, marker: impl Into<String>, rows: Vec<RawRecord>) -> Self {
        self.replies.push((marker.into(), Reply::Rows(rows)));
        self
    }

    /// Fail queries containing `marker` after streaming nothing.
    #[must_use]
    pub fn with_failure(mut self, marker: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies.push((marker.into(), Reply::Fail(message.into())));
        self
    }

    /// A source whose liveness check fails.
    #[must_use]
    pub fn disconnected(mut self) -> Self {
        self.live = false;
        self
    }

    /// SQL text of every query executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn check_live(&self) -> Result<()> {
        if self.live {
            Ok(())
        } else {
            Err(ExtractError::NotConnected("memory source is closed".into()))
        }
    }

    async fn server_version(&self) -> Result<String> {
        self.check_live().await?;
        Ok(format!("sourcesense memory source {}", env!("CARGO_PKG_VERSION")))
    }

    fn stream_query(&self, sql: &str, batch_size: usize) -> mpsc::Receiver<Result<Vec<RawRecord>>> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        let reply = self
            .replies
            .iter()
            .find(|(marker, _)| sql.contains(marker.as_str()))
            .map(|(_, reply)| reply);

        let items: Vec<Result<Vec<RawRecord>>> = match reply {
            None => Vec::new(),
            Some(Reply::Fail(message)) => vec![Err(ExtractError::step("query", message.clone()))],
            Some(Reply::Rows(rows)) => rows
                .chunks(batch_size.max(1))
                .map(|chunk| Ok(chunk.to_vec()))
                .collect(),
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    async fn close(&self) {}
}

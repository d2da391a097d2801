//! Data sources that execute extraction queries.
//!
//! A [`DataSource`] is the bound handle an extraction activity runs its
//! query against. Rows come back in batches over a bounded channel so the
//! consumer sets the pace.

mod memory;
mod postgres;

pub use memory::MemorySource;
pub use postgres::PgDataSource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::RawRecord;
use crate::error::Result;

/// Channel capacity for streamed batches.
pub const STREAM_BUFFER: usize = 16;

/// A live handle to a source database.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Verify the handle can serve queries.
    ///
    /// Returns [`ExtractError::NotConnected`](crate::error::ExtractError::NotConnected)
    /// when it cannot.
    async fn check_live(&self) -> Result<()>;

    /// Server version string.
    async fn server_version(&self) -> Result<String>;

    /// Execute `sql` and stream its rows in batches of at most `batch_size`.
    ///
    /// A failure is delivered as the last item on the channel.
    fn stream_query(&self, sql: &str, batch_size: usize) -> mpsc::Receiver<Result<Vec<RawRecord>>>;

    /// Release pooled connections.
    async fn close(&self);
}

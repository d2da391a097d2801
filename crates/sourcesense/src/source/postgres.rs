//! PostgreSQL data source.
//!
//! Uses deadpool-postgres for pooling and streams rows with `query_raw` so a
//! large catalog never sits in memory at once.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::StreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_postgres::types::{Kind, ToSql, Type};
use tracing::debug;

use crate::config::SourceConfig;
use crate::core::{RawRecord, RawValue};
use crate::error::{ExtractError, Result};

use super::{DataSource, STREAM_BUFFER};

/// PostgreSQL data source backed by a connection pool.
pub struct PgDataSource {
    pool: Pool,
    label: String,
}

impl PgDataSource {
    /// Build the pool. Connections are opened on first use.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(config.pg_config(), tokio_postgres::NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| ExtractError::pool(e, "creating PostgreSQL source pool"))?;

        Ok(Self {
            pool,
            label: config.display_target(),
        })
    }
}

#[async_trait]
impl DataSource for PgDataSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check_live(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| ExtractError::NotConnected(format!("{}: {}", self.label, e)))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExtractError::NotConnected(format!("{}: {}", self.label, e)))?;
        Ok(())
    }

    async fn server_version(&self) -> Result<String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| ExtractError::pool(e, "getting connection for server_version"))?;
        let row = client.query_one("SELECT version()", &[]).await?;
        Ok(row.try_get::<_, String>(0)?)
    }

    fn stream_query(&self, sql: &str, batch_size: usize) -> mpsc::Receiver<Result<Vec<RawRecord>>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pool = self.pool.clone();
        let sql = sql.to_string();

        tokio::spawn(async move {
            if let Err(e) = stream_query_internal(pool, sql, batch_size.max(1), tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn close(&self) {
        self.pool.close();
    }
}

fn slice_iter<'a>(
    s: &'a [&'a (dyn ToSql + Sync)],
) -> impl ExactSizeIterator<Item = &'a dyn ToSql> + 'a {
    s.iter().map(|s| *s as _)
}

async fn stream_query_internal(
    pool: Pool,
    sql: String,
    batch_size: usize,
    tx: mpsc::Sender<Result<Vec<RawRecord>>>,
) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| ExtractError::pool(e, "getting connection for stream_query"))?;

    let stream = client.query_raw(sql.as_str(), slice_iter(&[])).await?;
    tokio::pin!(stream);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let row = row?;
        batch.push(convert_row(&row));
        total += 1;

        if batch.len() >= batch_size {
            if tx.send(Ok(std::mem::take(&mut batch))).await.is_err() {
                debug!("Receiver dropped after {} rows", total);
                return Ok(());
            }
            batch = Vec::with_capacity(batch_size);
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(Ok(batch)).await;
    }
    debug!("Query streamed {} rows", total);
    Ok(())
}

/// Convert a row into a raw record keyed by column name.
fn convert_row(row: &tokio_postgres::Row) -> RawRecord {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), convert_pg_value(row, idx, column.type_())))
        .collect()
}

/// Convert one column value by its type name. Values that cannot be decoded
/// become NULL.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> RawValue {
    let ty = match ty.kind() {
        Kind::Domain(inner) => inner,
        _ => ty,
    };

    match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx).ok().flatten().into(),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Int(v.into()))
            .unwrap_or(RawValue::Null),
        "int4" => row.try_get::<_, Option<i32>>(idx).ok().flatten().into(),
        "int8" => row.try_get::<_, Option<i64>>(idx).ok().flatten().into(),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Int(v.into()))
            .unwrap_or(RawValue::Null),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::float(v.into()))
            .unwrap_or(RawValue::Null),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(RawValue::float)
            .unwrap_or(RawValue::Null),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)
            .ok()
            .flatten()
            .map(decimal_value)
            .unwrap_or(RawValue::Null),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Text(v.to_string()))
            .unwrap_or(RawValue::Null),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Text(v.to_rfc3339()))
            .unwrap_or(RawValue::Null),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Text(v.to_string()))
            .unwrap_or(RawValue::Null),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Text(v.to_string()))
            .unwrap_or(RawValue::Null),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(|v| RawValue::Text(v.to_string()))
            .unwrap_or(RawValue::Null),
        "_text" | "_varchar" | "_name" | "_bpchar" => row
            .try_get::<_, Option<Vec<Option<String>>>>(idx)
            .ok()
            .flatten()
            .into(),
        "_int4" => row
            .try_get::<_, Option<Vec<Option<i32>>>>(idx)
            .ok()
            .flatten()
            .into(),
        "_int8" => row
            .try_get::<_, Option<Vec<Option<i64>>>>(idx)
            .ok()
            .flatten()
            .into(),
        "_float4" => row
            .try_get::<_, Option<Vec<Option<f32>>>>(idx)
            .ok()
            .flatten()
            .map(|items| {
                RawValue::List(
                    items
                        .into_iter()
                        .map(|v| v.map(|f| RawValue::float(f.into())).unwrap_or(RawValue::Null))
                        .collect(),
                )
            })
            .unwrap_or(RawValue::Null),
        "_float8" => row
            .try_get::<_, Option<Vec<Option<f64>>>>(idx)
            .ok()
            .flatten()
            .map(|items| {
                RawValue::List(
                    items
                        .into_iter()
                        .map(|v| v.map(RawValue::float).unwrap_or(RawValue::Null))
                        .collect(),
                )
            })
            .unwrap_or(RawValue::Null),
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().into(),
    }
}

/// Whole numerics stay integers; everything else becomes a float.
fn decimal_value(d: Decimal) -> RawValue {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return RawValue::Int(i);
        }
    }
    d.to_f64().map(RawValue::float).unwrap_or(RawValue::Null)
}

//! Postgres connection pool and transaction adapter
//!
//! Uses sqlx `PgPool` with explicit bounds on open connections, warm idle
//! connections, idle time, and connection lifetime. Rows are decoded into
//! backend-neutral [`Row`]s so repositories never see sqlx types.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use uuid::Uuid;

use crate::context::{ContextKey, RequestContext};
use crate::db::client::{
    with_deadline, ClientError, ExecResult, Row, SqlOperations, SqlValue, Statement,
};
use crate::db::transaction::{NativeTransaction, TransactionHandle, TransactionManager};

/// Context slot for an open Postgres unit of work.
pub const PG_TRANSACTION_KEY: ContextKey = ContextKey::new("postgres transaction");

const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_LIFETIME_SECS: u64 = 300;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Pool sizing and transaction behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept warm while idle
    pub min_connections: u32,
    /// Idle connections above `min_connections` are closed after this long
    pub idle_timeout_secs: u64,
    /// Connections are recycled after this long
    pub max_lifetime_secs: u64,
    /// How long a caller waits for a free connection
    pub acquire_timeout_secs: u64,
    /// Issue `SET CONSTRAINTS ALL DEFERRED` at the start of every unit of work
    pub defer_constraints: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 0,
            idle_timeout_secs: DEFAULT_LIFETIME_SECS,
            max_lifetime_secs: DEFAULT_LIFETIME_SECS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            defer_constraints: true,
        }
    }
}

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the first connection cannot be established.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/articles", &PoolConfig::default()).await?;
/// ```
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Postgres implementation of the pool-level capability set.
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
    defer_constraints: bool,
}

impl PgClient {
    pub fn new(pool: PgPool, defer_constraints: bool) -> Self {
        Self {
            pool,
            defer_constraints,
        }
    }

    /// Connect using `config`.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, sqlx::Error> {
        let pool = create_pool(database_url, config).await?;
        Ok(Self::new(pool, config.defer_constraints))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every connection; waits for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SqlOperations for PgClient {
    async fn query(&self, ctx: &RequestContext, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        let result = with_deadline(ctx, async {
            let rows = bind_params(&stmt.sql, &stmt.params)
                .fetch_all(&self.pool)
                .await?;
            decode_rows(&rows)
        })
        .await;

        if let Err(e) = &result {
            tracing::error!(request_id = ctx.request_id(), error = %e, sql = %stmt, "pool query failed");
        }
        result
    }

    async fn exec(&self, ctx: &RequestContext, stmt: &Statement) -> Result<ExecResult, ClientError> {
        let result = with_deadline(ctx, async {
            let done = bind_params(&stmt.sql, &stmt.params)
                .execute(&self.pool)
                .await?;
            Ok::<_, ClientError>(ExecResult {
                rows_affected: done.rows_affected(),
            })
        })
        .await;

        if let Err(e) = &result {
            tracing::error!(request_id = ctx.request_id(), error = %e, sql = %stmt, "pool exec failed");
        }
        result
    }
}

#[async_trait]
impl TransactionManager for PgClient {
    type Native = PgNative;

    fn transaction_context_key(&self) -> ContextKey {
        PG_TRANSACTION_KEY
    }

    async fn start_transaction(
        &self,
        ctx: &RequestContext,
    ) -> Result<TransactionHandle<PgNative>, ClientError> {
        let defer = self.defer_constraints;
        let tx = with_deadline(ctx, async {
            let mut tx = self.pool.begin().await?;
            if defer {
                sqlx::query("SET CONSTRAINTS ALL DEFERRED")
                    .execute(&mut *tx)
                    .await?;
            }
            Ok::<_, ClientError>(tx)
        })
        .await;

        match tx {
            Ok(tx) => {
                let handle = TransactionHandle::new(PgNative { tx });
                tracing::debug!(txn_id = handle.id(), request_id = ctx.request_id(), "postgres transaction begun");
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(request_id = ctx.request_id(), error = %e, "failed to begin postgres transaction");
                Err(e)
            }
        }
    }
}

/// Native sqlx transaction.
///
/// Dropping it without commit makes sqlx roll back, which covers panics and
/// abandoned request futures.
pub struct PgNative {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl NativeTransaction for PgNative {
    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        let rows = bind_params(&stmt.sql, &stmt.params)
            .fetch_all(&mut *self.tx)
            .await?;
        decode_rows(&rows)
    }

    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult, ClientError> {
        let done = bind_params(&stmt.sql, &stmt.params)
            .execute(&mut *self.tx)
            .await?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
        })
    }

    async fn commit(self) -> Result<(), ClientError> {
        self.tx.commit().await.map_err(ClientError::from)
    }

    async fn rollback(self) -> Result<(), ClientError> {
        self.tx.rollback().await.map_err(ClientError::from)
    }
}

fn bind_params<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), |query, param| match param {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    })
}

fn decode_rows(rows: &[PgRow]) -> Result<Vec<Row>, ClientError> {
    rows.iter().map(decode_row).collect()
}

fn decode_row(row: &PgRow) -> Result<Row, ClientError> {
    let values = row
        .columns()
        .iter()
        .map(|column| -> Result<SqlValue, ClientError> {
            let index = column.ordinal();
            let type_name = column.type_info().name();
            let value = match type_name {
                "UUID" => row.try_get::<Option<Uuid>, _>(index)?.map(SqlValue::Uuid),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text)
                }
                "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
                "INT4" => row
                    .try_get::<Option<i32>, _>(index)?
                    .map(|v| SqlValue::Int(i64::from(v))),
                "INT2" => row
                    .try_get::<Option<i16>, _>(index)?
                    .map(|v| SqlValue::Int(i64::from(v))),
                "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(index)?
                    .map(SqlValue::Timestamp),
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(index)?
                    .map(|v| SqlValue::Timestamp(v.and_utc())),
                other => {
                    return Err(ClientError::UnsupportedColumn {
                        index,
                        type_name: other.to_owned(),
                    })
                }
            };
            Ok(value.unwrap_or(SqlValue::Null))
        })
        .collect::<Result<Vec<_>, ClientError>>()?;

    Ok(Row::new(values))
}

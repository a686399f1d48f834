//! Connection-level primitives shared by every backend
//!
//! - `Statement`: SQL text plus positional (`$n`) parameters
//! - `Row` / `SqlValue`: backend-neutral result rows
//! - `SqlOperations`: the {query, exec} capability implemented by pools,
//!   transactions, and the resolved `ConnectionHandle`
//!
//! Errors at this level (`ClientError`) are raw; repositories translate them
//! into `DbError` before returning.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::context::RequestContext;

/// A single bound parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Name used in scan errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// SQL text with its positional parameters, in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
}

/// A decoded result row, addressed by column position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode column `index` as `T`.
    pub fn get<T: FromSqlValue>(&self, index: usize) -> Result<T, ScanError> {
        match self.values.get(index) {
            Some(value) => T::from_sql_value(value).ok_or(ScanError {
                index,
                expected: T::EXPECTED,
                found: value.kind(),
            }),
            None => Err(ScanError {
                index,
                expected: T::EXPECTED,
                found: "missing column",
            }),
        }
    }
}

/// Conversion from a column value into a Rust type.
pub trait FromSqlValue: Sized {
    const EXPECTED: &'static str;

    fn from_sql_value(value: &SqlValue) -> Option<Self>;
}

impl FromSqlValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSqlValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSqlValue for String {
    const EXPECTED: &'static str = "text";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromSqlValue for Uuid {
    const EXPECTED: &'static str = "uuid";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    const EXPECTED: &'static str = "timestamp";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

/// A column could not be decoded into the requested type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("column {index}: expected {expected}, found {found}")]
pub struct ScanError {
    pub index: usize,
    pub expected: &'static str,
    pub found: &'static str,
}

/// Raw, driver-level error. Never crosses the repository boundary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("operation cancelled: request deadline exceeded")]
    Cancelled,

    #[error("transaction {id} is no longer open")]
    TransactionClosed { id: String },

    #[error("column {index} has unsupported type {type_name}")]
    UnsupportedColumn { index: usize, type_name: String },

    #[error("driver error: {0}")]
    Driver(String),
}

/// The {query, exec} capability.
///
/// Implemented by the pool, by open transactions, and by `ConnectionHandle`,
/// so repository code is written once against this trait.
#[async_trait]
pub trait SqlOperations: Send + Sync {
    /// Run a read and return every row.
    async fn query(&self, ctx: &RequestContext, stmt: &Statement) -> Result<Vec<Row>, ClientError>;

    /// Run a write and report affected rows.
    async fn exec(&self, ctx: &RequestContext, stmt: &Statement) -> Result<ExecResult, ClientError>;
}

/// Run `fut` bounded by the context deadline, if any.
pub async fn with_deadline<T, F>(ctx: &RequestContext, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| ClientError::Cancelled)?,
        None => fut.await,
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse runs of whitespace so multi-line SQL logs on one line.
pub fn normalize_sql(sql: &str) -> String {
    WHITESPACE.replace_all(sql, " ").trim().to_owned()
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&normalize_sql(&self.sql))
    }
}

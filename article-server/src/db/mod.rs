//! Database access layer
//!
//! - `client`: backend-neutral statements, rows, and the `SqlOperations` seam
//! - `transaction`: unit-of-work handle, `start`/`release`, ambient resolver
//! - `pool`: PostgreSQL pool (`PgClient`) implementing both seams
//! - `query`: structured WHERE/ORDER/LIMIT assembly
//! - `repos`: article and author repositories

pub mod client;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repos;
pub mod transaction;

#[cfg(test)]
pub mod mock;

pub use client::{ClientError, ExecResult, Row, SqlOperations, SqlValue, Statement};
pub use pool::{create_pool, PgClient, PoolConfig};
pub use repos::{ArticleRepo, AuthorRepo, DbError};
pub use transaction::{
    get_client_or_txn, release, start, ConnectionHandle, TransactionHandle, TransactionManager,
    TxnState,
};

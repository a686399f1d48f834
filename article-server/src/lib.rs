//! article-server: transaction-aware article store with an HTTP adapter
//!
//! Repository methods are written once against a resolved connection and run
//! either directly on the pool or inside a unit of work carried by the
//! request context.
//!
//! Layout:
//! - `context`: immutable request context (request id, deadline, values)
//! - `db`: pool, unit of work, ambient resolver, query builder, repositories
//! - `models`: validated domain types and pagination
//! - `search`: free-text search seam
//! - `service`: article use cases owning unit-of-work boundaries
//! - `http`: axum routes, extractors, and error mapping

pub mod context;
pub mod db;
pub mod http;
pub mod models;
pub mod search;
pub mod service;

pub use context::{ContextKey, RequestContext};
pub use db::{DbError, PgClient, PoolConfig};
pub use http::{run_server, ServerConfig};
pub use search::{ArticleSearch, DisabledSearch, SearchError};
pub use service::{ArticleService, ServiceError};

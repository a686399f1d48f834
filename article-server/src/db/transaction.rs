//! Unit of work and the ambient connection resolver
//!
//! A unit of work is started against a `TransactionManager` (the pool), stored
//! in a derived `RequestContext` under the pool's `ContextKey`, and finished by
//! `commit` or `rollback`. Repository calls never start transactions
//! themselves: callers resolve a `ConnectionHandle` from the context and hand
//! it over, so the same repository method runs standalone or inside a larger
//! unit of work.
//!
//! # State machine
//!
//! ```text
//! Open --commit ok--> Committed
//! Open --rollback---> RolledBack
//! Open --commit err-> Open (native resource gone, rollback only marks)
//! ```
//!
//! Rollback after commit is an `Ok` no-op, so `release` can run on every exit
//! path without undoing a successful commit.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::context::{time_based_id, ContextKey, RequestContext};
use crate::db::client::{with_deadline, ClientError, ExecResult, Row, SqlOperations, Statement};

/// Backend transaction resource wrapped by a [`TransactionHandle`].
///
/// `commit` and `rollback` consume the resource; the handle guarantees at most
/// one of them is ever called.
#[async_trait]
pub trait NativeTransaction: Send + 'static {
    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, ClientError>;

    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult, ClientError>;

    async fn commit(self) -> Result<(), ClientError>;

    async fn rollback(self) -> Result<(), ClientError>;
}

/// Lifecycle of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Committed,
    RolledBack,
}

struct Slot<N> {
    native: Option<N>,
    state: TxnState,
}

/// An open unit of work.
///
/// Statements issued through one handle are serialised by its lock and run in
/// issue order.
pub struct TransactionHandle<N> {
    id: String,
    slot: Mutex<Slot<N>>,
}

impl<N: NativeTransaction> TransactionHandle<N> {
    /// Wrap a freshly begun native transaction with a new trace id.
    pub fn new(native: N) -> Self {
        Self::with_id(generate_transaction_id(), native)
    }

    pub fn with_id(id: impl Into<String>, native: N) -> Self {
        Self {
            id: id.into(),
            slot: Mutex::new(Slot {
                native: Some(native),
                state: TxnState::Open,
            }),
        }
    }

    /// Trace id, e.g. `txn::K2J9QW1Z-7`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn state(&self) -> TxnState {
        self.slot.lock().await.state
    }

    /// Commit. On failure the state stays `Open` and no retry is attempted.
    pub async fn commit(&self, ctx: &RequestContext) -> Result<(), ClientError> {
        let mut slot = self.slot.lock().await;
        let native = match (slot.state, slot.native.take()) {
            (TxnState::Open, Some(native)) => native,
            (_, native) => {
                slot.native = native;
                return Err(self.closed());
            }
        };

        match with_deadline(ctx, native.commit()).await {
            Ok(()) => {
                slot.state = TxnState::Committed;
                tracing::debug!(txn_id = %self.id, request_id = ctx.request_id(), "transaction committed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    txn_id = %self.id,
                    request_id = ctx.request_id(),
                    error = %e,
                    "transaction commit failed"
                );
                Err(e)
            }
        }
    }

    /// Roll back. A no-op returning `Ok` once committed or already rolled back.
    pub async fn rollback(&self, ctx: &RequestContext) -> Result<(), ClientError> {
        let mut slot = self.slot.lock().await;
        if slot.state != TxnState::Open {
            return Ok(());
        }
        slot.state = TxnState::RolledBack;

        let Some(native) = slot.native.take() else {
            // A failed commit already consumed the resource; the driver
            // discards the transaction with the connection state.
            return Ok(());
        };

        let result = with_deadline(ctx, native.rollback()).await;
        if let Err(e) = &result {
            tracing::error!(
                txn_id = %self.id,
                request_id = ctx.request_id(),
                error = %e,
                "transaction rollback failed"
            );
        } else {
            tracing::debug!(txn_id = %self.id, request_id = ctx.request_id(), "transaction rolled back");
        }
        result
    }

    fn closed(&self) -> ClientError {
        ClientError::TransactionClosed {
            id: self.id.clone(),
        }
    }
}

#[async_trait]
impl<N: NativeTransaction> SqlOperations for TransactionHandle<N> {
    async fn query(&self, ctx: &RequestContext, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        let mut slot = self.slot.lock().await;
        if slot.state != TxnState::Open {
            return Err(self.closed());
        }
        let native = slot.native.as_mut().ok_or_else(|| self.closed())?;
        let result = with_deadline(ctx, native.query(stmt)).await;
        if let Err(e) = &result {
            tracing::error!(txn_id = %self.id, request_id = ctx.request_id(), error = %e, sql = %stmt, "transaction query failed");
        }
        result
    }

    async fn exec(&self, ctx: &RequestContext, stmt: &Statement) -> Result<ExecResult, ClientError> {
        let mut slot = self.slot.lock().await;
        if slot.state != TxnState::Open {
            return Err(self.closed());
        }
        let native = slot.native.as_mut().ok_or_else(|| self.closed())?;
        let result = with_deadline(ctx, native.exec(stmt)).await;
        if let Err(e) = &result {
            tracing::error!(txn_id = %self.id, request_id = ctx.request_id(), error = %e, sql = %stmt, "transaction exec failed");
        }
        result
    }
}

/// A pool that can begin units of work.
#[async_trait]
pub trait TransactionManager: SqlOperations + 'static {
    type Native: NativeTransaction;

    /// Slot under which this backend's open transaction lives in a context.
    fn transaction_context_key(&self) -> ContextKey;

    /// Begin a native transaction and wrap it in a handle.
    async fn start_transaction(
        &self,
        ctx: &RequestContext,
    ) -> Result<TransactionHandle<Self::Native>, ClientError>;
}

/// Transaction handle type produced by manager `M`.
pub type TxnOf<M> = TransactionHandle<<M as TransactionManager>::Native>;

/// Start a unit of work and derive a context that carries it.
///
/// On failure the caller keeps its original context; the error is terminal.
pub async fn start<M: TransactionManager>(
    ctx: &RequestContext,
    manager: &M,
) -> Result<(RequestContext, Arc<TxnOf<M>>), ClientError> {
    let txn = Arc::new(manager.start_transaction(ctx).await?);
    let key = manager.transaction_context_key();
    let derived = ctx.with_value(key, txn.clone());
    tracing::debug!(txn_id = txn.id(), request_id = ctx.request_id(), slot = %key, "unit of work started");
    Ok((derived, txn))
}

/// Scoped release: roll back unless already committed.
///
/// Call on every exit path after [`start`]. Failures are logged and never
/// replace the operation's own result.
pub async fn release<N: NativeTransaction>(ctx: &RequestContext, txn: &TransactionHandle<N>) {
    if let Err(e) = txn.rollback(ctx).await {
        tracing::warn!(txn_id = txn.id(), error = %e, "ignoring rollback failure during release");
    }
}

/// The connection a repository call should use.
pub enum ConnectionHandle<'a, M: TransactionManager> {
    /// No unit of work in scope: statements go straight to the pool.
    Pool(&'a M),
    /// Statements join the open unit of work.
    Transaction(Arc<TxnOf<M>>),
}

impl<'a, M: TransactionManager> ConnectionHandle<'a, M> {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }

    /// The open unit of work, when this handle joined one.
    pub fn transaction(&self) -> Option<&Arc<TxnOf<M>>> {
        match self {
            Self::Pool(_) => None,
            Self::Transaction(txn) => Some(txn),
        }
    }
}

#[async_trait]
impl<'a, M: TransactionManager> SqlOperations for ConnectionHandle<'a, M> {
    async fn query(&self, ctx: &RequestContext, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        match self {
            Self::Pool(pool) => pool.query(ctx, stmt).await,
            Self::Transaction(txn) => txn.query(ctx, stmt).await,
        }
    }

    async fn exec(&self, ctx: &RequestContext, stmt: &Statement) -> Result<ExecResult, ClientError> {
        match self {
            Self::Pool(pool) => pool.exec(ctx, stmt).await,
            Self::Transaction(txn) => txn.exec(ctx, stmt).await,
        }
    }
}

/// Resolve the ambient connection: the open unit of work stored in `ctx` for
/// this pool, or the pool itself.
pub fn get_client_or_txn<'a, M: TransactionManager>(
    ctx: &RequestContext,
    pool: &'a M,
) -> ConnectionHandle<'a, M> {
    match ctx.value::<TxnOf<M>>(pool.transaction_context_key()) {
        Some(txn) => ConnectionHandle::Transaction(txn),
        None => ConnectionHandle::Pool(pool),
    }
}

pub fn generate_transaction_id() -> String {
    time_based_id("txn")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{MockClient, Via};

    #[tokio::test]
    async fn resolver_returns_pool_without_unit_of_work() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();

        let conn = get_client_or_txn(&ctx, &pool);
        assert!(!conn.is_transaction());
    }

    #[tokio::test]
    async fn resolver_returns_injected_transaction_after_start() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();

        let (txn_ctx, txn) = start(&ctx, &pool).await.unwrap();
        let conn = get_client_or_txn(&txn_ctx, &pool);

        let resolved = conn.transaction().expect("transaction handle");
        assert!(Arc::ptr_eq(resolved, &txn));

        // The parent context is untouched.
        assert!(!get_client_or_txn(&ctx, &pool).is_transaction());
    }

    #[tokio::test]
    async fn statements_follow_resolved_handle() {
        let pool = MockClient::new();
        pool.expect_exec(1);
        pool.expect_exec(1);
        let ctx = RequestContext::new();
        let stmt = Statement::new("UPDATE articles SET title = $1").bind("t");

        get_client_or_txn(&ctx, &pool).exec(&ctx, &stmt).await.unwrap();

        let (txn_ctx, txn) = start(&ctx, &pool).await.unwrap();
        get_client_or_txn(&txn_ctx, &pool)
            .exec(&txn_ctx, &stmt)
            .await
            .unwrap();

        let recorded = pool.recorded();
        assert_eq!(recorded[0].via, Via::Pool);
        assert_eq!(recorded[1].via, Via::Transaction(txn.id().to_owned()));
    }

    #[tokio::test]
    async fn failed_start_returns_error() {
        let pool = MockClient::new();
        pool.fail_begin();
        let ctx = RequestContext::new();

        let err = start(&ctx, &pool).await.err().expect("start should fail");
        assert!(matches!(err, ClientError::Driver(_)));
        assert!(!get_client_or_txn(&ctx, &pool).is_transaction());
    }

    #[tokio::test]
    async fn rollback_after_commit_is_noop() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();
        let (ctx, txn) = start(&ctx, &pool).await.unwrap();

        txn.commit(&ctx).await.unwrap();
        txn.rollback(&ctx).await.unwrap();

        assert_eq!(txn.state().await, TxnState::Committed);
        assert_eq!(pool.commits(), 1);
        assert_eq!(pool.native_rollbacks(), 0);
    }

    #[tokio::test]
    async fn release_rolls_back_open_unit_of_work() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();
        let (ctx, txn) = start(&ctx, &pool).await.unwrap();

        release(&ctx, &txn).await;
        release(&ctx, &txn).await;

        assert_eq!(txn.state().await, TxnState::RolledBack);
        assert_eq!(pool.native_rollbacks(), 1);
    }

    #[tokio::test]
    async fn failed_commit_stays_open_then_releases_without_native_call() {
        let pool = MockClient::new();
        pool.fail_commit();
        let ctx = RequestContext::new();
        let (ctx, txn) = start(&ctx, &pool).await.unwrap();

        assert!(txn.commit(&ctx).await.is_err());
        assert_eq!(txn.state().await, TxnState::Open);

        // A second commit cannot succeed: the native resource is gone.
        assert!(matches!(
            txn.commit(&ctx).await,
            Err(ClientError::TransactionClosed { .. })
        ));

        txn.rollback(&ctx).await.unwrap();
        assert_eq!(txn.state().await, TxnState::RolledBack);
        assert_eq!(pool.native_rollbacks(), 0);
    }

    #[tokio::test]
    async fn statements_after_finish_are_rejected() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();
        let (ctx, txn) = start(&ctx, &pool).await.unwrap();
        txn.commit(&ctx).await.unwrap();

        let stmt = Statement::new("SELECT 1");
        let err = txn.query(&ctx, &stmt).await.unwrap_err();
        assert!(matches!(err, ClientError::TransactionClosed { .. }));
    }

    #[tokio::test]
    async fn commit_after_rollback_is_rejected() {
        let pool = MockClient::new();
        let ctx = RequestContext::new();
        let (ctx, txn) = start(&ctx, &pool).await.unwrap();

        txn.rollback(&ctx).await.unwrap();
        assert!(txn.commit(&ctx).await.is_err());
        assert_eq!(pool.commits(), 0);
    }

    #[test]
    fn transaction_ids_are_prefixed() {
        assert!(generate_transaction_id().starts_with("txn::"));
    }
}

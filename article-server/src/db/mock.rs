//! Scripted in-memory backend for tests
//!
//! Replies are consumed in FIFO order by whichever handle issues the next
//! statement. Every statement is recorded together with the handle it went
//! through, and commits / native rollbacks are counted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::context::{ContextKey, RequestContext};
use crate::db::client::{ClientError, ExecResult, Row, SqlOperations, Statement};
use crate::db::transaction::{
    generate_transaction_id, NativeTransaction, TransactionHandle, TransactionManager,
};

const MOCK_TRANSACTION_KEY: ContextKey = ContextKey::new("mock transaction");

/// Which handle a statement went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Via {
    Pool,
    Transaction(String),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub via: Via,
    pub stmt: Statement,
}

enum Reply {
    Rows(Vec<Row>),
    Exec(u64),
    Fail(String),
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<Reply>,
    recorded: Vec<Recorded>,
    fail_begin: bool,
    fail_commit: bool,
    begun: usize,
    commits: usize,
    native_rollbacks: usize,
}

impl MockState {
    fn next_rows(&mut self, via: Via, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        self.recorded.push(Recorded {
            via,
            stmt: stmt.clone(),
        });
        match self.replies.pop_front() {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(msg)) => Err(ClientError::Driver(msg)),
            Some(Reply::Exec(_)) => Err(ClientError::Driver("scripted exec, got query".into())),
            None => Err(ClientError::Driver("no scripted reply".into())),
        }
    }

    fn next_exec(&mut self, via: Via, stmt: &Statement) -> Result<ExecResult, ClientError> {
        self.recorded.push(Recorded {
            via,
            stmt: stmt.clone(),
        });
        match self.replies.pop_front() {
            Some(Reply::Exec(rows_affected)) => Ok(ExecResult { rows_affected }),
            Some(Reply::Fail(msg)) => Err(ClientError::Driver(msg)),
            Some(Reply::Rows(_)) => Err(ClientError::Driver("scripted query, got exec".into())),
            None => Err(ClientError::Driver("no scripted reply".into())),
        }
    }
}

/// Scripted pool.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn expect_query(&self, rows: Vec<Row>) {
        self.state().replies.push_back(Reply::Rows(rows));
    }

    pub fn expect_exec(&self, rows_affected: u64) {
        self.state().replies.push_back(Reply::Exec(rows_affected));
    }

    pub fn expect_error(&self, message: &str) {
        self.state().replies.push_back(Reply::Fail(message.to_owned()));
    }

    pub fn fail_begin(&self) {
        self.state().fail_begin = true;
    }

    pub fn fail_commit(&self) {
        self.state().fail_commit = true;
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.state().recorded.clone()
    }

    pub fn transactions_started(&self) -> usize {
        self.state().begun
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn native_rollbacks(&self) -> usize {
        self.state().native_rollbacks
    }

    pub fn pending_replies(&self) -> usize {
        self.state().replies.len()
    }
}

#[async_trait]
impl SqlOperations for MockClient {
    async fn query(&self, _ctx: &RequestContext, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        self.state().next_rows(Via::Pool, stmt)
    }

    async fn exec(&self, _ctx: &RequestContext, stmt: &Statement) -> Result<ExecResult, ClientError> {
        self.state().next_exec(Via::Pool, stmt)
    }
}

#[async_trait]
impl TransactionManager for MockClient {
    type Native = MockNative;

    fn transaction_context_key(&self) -> ContextKey {
        MOCK_TRANSACTION_KEY
    }

    async fn start_transaction(
        &self,
        _ctx: &RequestContext,
    ) -> Result<TransactionHandle<MockNative>, ClientError> {
        let mut state = self.state();
        if state.fail_begin {
            return Err(ClientError::Driver("begin refused".into()));
        }
        state.begun += 1;
        drop(state);

        let id = generate_transaction_id();
        Ok(TransactionHandle::with_id(
            id.clone(),
            MockNative {
                id,
                state: self.state.clone(),
            },
        ))
    }
}

/// Native side of a scripted transaction.
pub struct MockNative {
    id: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl NativeTransaction for MockNative {
    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>, ClientError> {
        let via = Via::Transaction(self.id.clone());
        self.state.lock().unwrap().next_rows(via, stmt)
    }

    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult, ClientError> {
        let via = Via::Transaction(self.id.clone());
        self.state.lock().unwrap().next_exec(via, stmt)
    }

    async fn commit(self) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(ClientError::Driver("commit refused".into()));
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), ClientError> {
        self.state.lock().unwrap().native_rollbacks += 1;
        Ok(())
    }
}

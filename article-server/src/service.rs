//! Article use cases
//!
//! The service owns unit-of-work boundaries: repositories only ever see the
//! connection resolved from the request context.

use std::sync::Arc;

use uuid::Uuid;

use crate::context::RequestContext;
use crate::db::client::{SqlOperations, Statement};
use crate::db::repos::{ArticleRepo, AuthorRepo, DbError};
use crate::db::transaction::{get_client_or_txn, release, start, TransactionManager, TxnOf};
use crate::models::{
    clamp_limit, compute_offset, Article, ArticleFilter, ListArticles, NewArticle, Paginated,
    ValidationError,
};
use crate::search::{ArticleSearch, SearchError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("author '{id}' does not exist")]
    AuthorNotFound { id: Uuid },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

pub struct ArticleService<M, S> {
    pool: Arc<M>,
    search: Arc<S>,
}

impl<M, S> Clone for ArticleService<M, S> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            search: self.search.clone(),
        }
    }
}

impl<M: TransactionManager, S: ArticleSearch> ArticleService<M, S> {
    pub fn new(pool: Arc<M>, search: Arc<S>) -> Self {
        Self { pool, search }
    }

    /// Create an article for an existing author and return its id.
    ///
    /// Author lookup, insert, and indexing run in one unit of work; nothing is
    /// persisted unless the commit succeeds.
    pub async fn create_article(
        &self,
        ctx: &RequestContext,
        new: NewArticle,
    ) -> Result<Uuid, ServiceError> {
        let (txn_ctx, txn) = start(ctx, self.pool.as_ref()).await.map_err(|e| {
            tracing::error!(request_id = ctx.request_id(), error = %e, "failed to start unit of work");
            DbError::TransactionStartFailed
        })?;

        let result = self.create_in_unit_of_work(&txn_ctx, &txn, &new).await;
        release(&txn_ctx, &txn).await;
        result
    }

    async fn create_in_unit_of_work(
        &self,
        ctx: &RequestContext,
        txn: &TxnOf<M>,
        new: &NewArticle,
    ) -> Result<Uuid, ServiceError> {
        let conn = get_client_or_txn(ctx, self.pool.as_ref());

        let author = AuthorRepo::new(&conn)
            .get(ctx, new.author_id())
            .await
            .map_err(|e| match e {
                DbError::RecordNotFound { .. } => ServiceError::AuthorNotFound {
                    id: new.author_id(),
                },
                other => ServiceError::Db(other),
            })?;

        let id = Uuid::now_v7();
        let created_at = ArticleRepo::new(&conn).create(ctx, id, new).await?;

        let article = Article {
            id,
            title: new.title().to_owned(),
            body: new.body().to_owned(),
            created_at,
            author,
        };
        self.search.index(ctx, &article).await?;

        txn.commit(ctx)
            .await
            .map_err(|_| DbError::TransactionCommitFailed)?;

        tracing::info!(request_id = ctx.request_id(), txn_id = txn.id(), article_id = %id, "article created");
        Ok(id)
    }

    /// One page of articles plus the total matching count.
    pub async fn list_articles(
        &self,
        ctx: &RequestContext,
        req: ListArticles,
    ) -> Result<Paginated<Article>, ServiceError> {
        let limit = clamp_limit(req.limit);
        let page = req.page.max(1);
        let offset = compute_offset(page, limit);

        let mut ids = Vec::new();
        if let Some(query) = req.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            ids = self.search.search(ctx, query).await?;
            if ids.is_empty() {
                tracing::debug!(request_id = ctx.request_id(), query, "search returned no hits");
                return Ok(Paginated::empty(page, limit));
            }
        }

        let filter = ArticleFilter {
            ids,
            author_name: req.author_name,
            sort_by: req.sort_by,
            sort_direction: req.sort_direction,
            limit,
            offset,
        };

        let conn = get_client_or_txn(ctx, self.pool.as_ref());
        let repo = ArticleRepo::new(&conn);
        let items = repo.list(ctx, &filter).await?;
        let total = repo.count(ctx, &filter).await?;

        Ok(Paginated {
            items,
            total,
            page,
            per_page: limit,
        })
    }

    /// Round-trip a trivial statement through the pool.
    pub async fn check_store(&self, ctx: &RequestContext) -> Result<(), DbError> {
        self.pool
            .query(ctx, &Statement::new("SELECT 1"))
            .await
            .map_err(|e| {
                tracing::warn!(request_id = ctx.request_id(), error = %e, "store check failed");
                DbError::QueryFailed {
                    operation: "store check",
                }
            })?;
        Ok(())
    }
}

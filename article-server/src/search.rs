//! Full-text search seam
//!
//! The store answers structured filters; free-text queries go to a search
//! backend that returns matching article ids.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::models::Article;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("search backend is not configured")]
    Unavailable,

    #[error("search backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ArticleSearch: Send + Sync + 'static {
    /// Make `article` findable by free-text queries.
    async fn index(&self, ctx: &RequestContext, article: &Article) -> Result<(), SearchError>;

    /// Ids of articles matching `query`, best match first.
    async fn search(&self, ctx: &RequestContext, query: &str) -> Result<Vec<Uuid>, SearchError>;
}

/// Backend for deployments without a search index.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSearch;

#[async_trait]
impl ArticleSearch for DisabledSearch {
    async fn index(&self, ctx: &RequestContext, article: &Article) -> Result<(), SearchError> {
        tracing::debug!(
            request_id = ctx.request_id(),
            article_id = %article.id,
            "search disabled, skipping index"
        );
        Ok(())
    }

    async fn search(&self, _ctx: &RequestContext, _query: &str) -> Result<Vec<Uuid>, SearchError> {
        Err(SearchError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use chrono::Utc;

    #[tokio::test]
    async fn disabled_search_indexes_nothing_and_refuses_queries() {
        let ctx = RequestContext::new();
        let article = Article {
            id: Uuid::now_v7(),
            title: "t".into(),
            body: "b".into(),
            created_at: Utc::now(),
            author: Author {
                id: Uuid::now_v7(),
                name: "Chandra".into(),
            },
        };

        assert!(DisabledSearch.index(&ctx, &article).await.is_ok());
        assert_eq!(
            DisabledSearch.search(&ctx, "anything").await,
            Err(SearchError::Unavailable)
        );
    }
}

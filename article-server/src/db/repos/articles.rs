//! Article repository
//!
//! Handles article persistence with:
//! - Filtered, sorted, paged listing joined with authors (single query)
//! - Matching count for pagination metadata
//! - Single-row insert with affected-row verification

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbError;
use crate::context::RequestContext;
use crate::db::client::{Row, ScanError, SqlOperations, Statement};
use crate::db::query::{count_statement, list_statement};
use crate::models::{Article, ArticleFilter, Author, NewArticle};

const INSERT_ARTICLE: &str = "INSERT INTO articles (id, title, body, author_id, created_at) \
                              VALUES ($1, $2, $3, $4, $5)";

/// Article repository over any resolved connection.
pub struct ArticleRepo<'a, C: SqlOperations + ?Sized> {
    conn: &'a C,
}

impl<'a, C: SqlOperations + ?Sized> ArticleRepo<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert one article, returning the server-side creation timestamp.
    ///
    /// Zero affected rows is reported as `NoRowsAffected`, separately from a
    /// failed statement.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        article: &NewArticle,
    ) -> Result<DateTime<Utc>, DbError> {
        let created_at = Utc::now();
        let stmt = Statement::new(INSERT_ARTICLE)
            .bind(id)
            .bind(article.title())
            .bind(article.body())
            .bind(article.author_id())
            .bind(created_at);

        let result = self.conn.exec(ctx, &stmt).await.map_err(|e| {
            tracing::error!(request_id = ctx.request_id(), article_id = %id, error = %e, "article insert failed");
            DbError::InsertFailed { resource: "article" }
        })?;

        if result.rows_affected == 0 {
            tracing::error!(request_id = ctx.request_id(), article_id = %id, "article insert affected no rows");
            return Err(DbError::NoRowsAffected { resource: "article" });
        }

        Ok(created_at)
    }

    /// List articles matching `filter`.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &ArticleFilter,
    ) -> Result<Vec<Article>, DbError> {
        let rows = self
            .conn
            .query(ctx, &list_statement(filter))
            .await
            .map_err(|e| {
                tracing::error!(request_id = ctx.request_id(), error = %e, "article list query failed");
                DbError::QueryFailed {
                    operation: "article list",
                }
            })?;

        rows.iter()
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                tracing::error!(request_id = ctx.request_id(), error = %e, "article list scan failed");
                DbError::RowScanFailed {
                    operation: "article list",
                }
            })
    }

    /// Count articles matching `filter`, ignoring sort and paging.
    pub async fn count(&self, ctx: &RequestContext, filter: &ArticleFilter) -> Result<i64, DbError> {
        let rows = self
            .conn
            .query(ctx, &count_statement(filter))
            .await
            .map_err(|e| {
                tracing::error!(request_id = ctx.request_id(), error = %e, "article count query failed");
                DbError::QueryFailed {
                    operation: "article count",
                }
            })?;

        match rows.first() {
            Some(row) => row.get::<i64>(0).map_err(|e| {
                tracing::error!(request_id = ctx.request_id(), error = %e, "article count scan failed");
                DbError::RowScanFailed {
                    operation: "article count",
                }
            }),
            None => Ok(0),
        }
    }
}

fn article_from_row(row: &Row) -> Result<Article, ScanError> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
        author: Author {
            id: row.get(4)?,
            name: row.get(5)?,
        },
    })
}

//! Author repository

use uuid::Uuid;

use super::DbError;
use crate::context::RequestContext;
use crate::db::client::{Row, ScanError, SqlOperations, Statement};
use crate::models::Author;

const SELECT_AUTHOR: &str = "SELECT authors.id, authors.name FROM authors WHERE authors.id = $1";

pub struct AuthorRepo<'a, C: SqlOperations + ?Sized> {
    conn: &'a C,
}

impl<'a, C: SqlOperations + ?Sized> AuthorRepo<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Fetch one author by id.
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Author, DbError> {
        let stmt = Statement::new(SELECT_AUTHOR).bind(id);
        let rows = self.conn.query(ctx, &stmt).await.map_err(|e| {
            tracing::error!(request_id = ctx.request_id(), author_id = %id, error = %e, "author lookup failed");
            DbError::QueryFailed {
                operation: "author lookup",
            }
        })?;

        let row = rows.first().ok_or_else(|| DbError::RecordNotFound {
            resource: "author",
            id: id.to_string(),
        })?;

        author_from_row(row).map_err(|e| {
            tracing::error!(request_id = ctx.request_id(), author_id = %id, error = %e, "author row scan failed");
            DbError::RowScanFailed {
                operation: "author lookup",
            }
        })
    }
}

fn author_from_row(row: &Row) -> Result<Author, ScanError> {
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

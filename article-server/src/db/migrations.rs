//! Schema migrations for article tables

use sqlx::PgPool;

/// Create the author and article tables if they do not exist.
///
/// The article foreign key is deferrable so units of work that run
/// `SET CONSTRAINTS ALL DEFERRED` check it at commit.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running article migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS authors (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            author_id UUID NOT NULL REFERENCES authors(id)
                DEFERRABLE INITIALLY IMMEDIATE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_author ON articles(author_id)")
        .execute(pool)
        .await?;

    tracing::info!("Article migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::{create_pool, PoolConfig};

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_are_idempotent() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = create_pool(&url, &PoolConfig::default()).await.unwrap();

        run(&pool).await.unwrap();
        run(&pool).await.unwrap();

        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'articles')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists);
    }
}

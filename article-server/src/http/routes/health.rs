//! Liveness plus store reachability

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::db::transaction::TransactionManager;
use crate::http::extractors::RequestCtx;
use crate::http::server::AppState;
use crate::search::ArticleSearch;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /health - 200 when the pool answers `SELECT 1`, 503 otherwise
async fn health<M, S>(
    State(state): State<Arc<AppState<M, S>>>,
    RequestCtx(ctx): RequestCtx,
) -> (StatusCode, Json<HealthResponse>)
where
    M: TransactionManager,
    S: ArticleSearch,
{
    let (status, body) = match state.service.check_store(&ctx).await {
        Ok(()) => (StatusCode::OK, ("ok", "ok")),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, ("unavailable", "unreachable")),
    };
    (
        status,
        Json(HealthResponse {
            status: body.0,
            version: env!("CARGO_PKG_VERSION"),
            database: body.1,
        }),
    )
}

pub fn router<M, S>() -> Router<Arc<AppState<M, S>>>
where
    M: TransactionManager,
    S: ArticleSearch,
{
    Router::new().route("/health", get(health::<M, S>))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::db::client::{Row, SqlValue};
    use crate::db::mock::MockClient;
    use crate::http::server::{build_router, ServerConfig};
    use crate::search::DisabledSearch;
    use crate::service::ArticleService;

    fn app(pool: &MockClient) -> Router {
        let service = ArticleService::new(Arc::new(pool.clone()), Arc::new(DisabledSearch));
        build_router(service, &ServerConfig::default())
    }

    async fn get_health(app: Router) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn reachable_store_is_ok() {
        let pool = MockClient::new();
        pool.expect_query(vec![Row::new(vec![SqlValue::Int(1)])]);

        let (status, body) = get_health(app(&pool)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(pool.pending_replies(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_is_503() {
        let pool = MockClient::new();
        pool.expect_error("connection refused");

        let (status, body) = get_health(app(&pool)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["database"], "unreachable");
    }
}

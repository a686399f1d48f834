//! API error types with IntoResponse
//!
//! Every error kind maps to one stable status and machine-readable code,
//! rendered as `{"error": code, "message": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::db::repos::DbError;
use crate::models::ValidationError;
use crate::search::SearchError;
use crate::service::ServiceError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Referenced author does not exist (422)
    AuthorNotFound { id: Uuid },

    /// Repository failure, status depends on the kind
    Database(DbError),

    /// Search backend failure (500, logged)
    Search(SearchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AuthorNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(e) => match e {
                DbError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
                DbError::TransactionStartFailed => StatusCode::SERVICE_UNAVAILABLE,
                DbError::TransactionCommitFailed => StatusCode::CONFLICT,
                DbError::QueryFailed { .. }
                | DbError::RowScanFailed { .. }
                | DbError::InsertFailed { .. }
                | DbError::NoRowsAffected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::AuthorNotFound { .. } => "author_not_found",
            Self::Database(e) => e.code(),
            Self::Search(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Validation(e) => e.to_string(),
            Self::AuthorNotFound { id } => format!("author '{}' does not exist", id),
            Self::Database(e) => {
                if status.is_server_error() {
                    tracing::error!("Database error: {}", e);
                }
                e.to_string()
            }
            Self::Search(e) => {
                tracing::error!("Search error: {}", e);
                "an internal error occurred".to_owned()
            }
        };

        let body = json!({
            "error": self.code(),
            "message": message
        });
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        Self::Database(e)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Db(e) => Self::Database(e),
            ServiceError::AuthorNotFound { id } => Self::AuthorNotFound { id },
            ServiceError::Validation(e) => Self::Validation(e),
            ServiceError::Search(e) => Self::Search(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "title" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "title cannot be empty");
    }

    #[tokio::test]
    async fn record_not_found_is_404() {
        let err = ApiError::from(DbError::RecordNotFound {
            resource: "article",
            id: "x".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn author_not_found_is_422() {
        let err = ApiError::from(ServiceError::AuthorNotFound { id: Uuid::nil() });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "author_not_found");
    }

    #[test]
    fn transaction_kinds_have_distinct_statuses() {
        let start = ApiError::from(DbError::TransactionStartFailed);
        let commit = ApiError::from(DbError::TransactionCommitFailed);
        assert_eq!(start.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(start.code(), "transaction_start_failed");
        assert_eq!(commit.status(), StatusCode::CONFLICT);
        assert_eq!(commit.code(), "transaction_commit_failed");
    }

    #[test]
    fn store_failures_are_500_with_own_codes() {
        let cases = [
            (DbError::QueryFailed { operation: "x" }, "query_failed"),
            (DbError::RowScanFailed { operation: "x" }, "row_scan_failed"),
            (DbError::InsertFailed { resource: "x" }, "insert_failed"),
            (DbError::NoRowsAffected { resource: "x" }, "no_rows_affected"),
        ];
        for (kind, code) in cases {
            let err = ApiError::from(kind);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.code(), code);
        }
    }

    #[tokio::test]
    async fn search_errors_hide_details() {
        let err = ApiError::from(ServiceError::Search(SearchError::Backend(
            "secret host".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "an internal error occurred");
    }
}

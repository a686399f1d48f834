//! Custom Axum extractors

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use super::error::ApiError;
use super::server::AppState;
use crate::context::{generate_request_id, RequestContext};
use crate::models::ValidationError;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Request-scoped context: request id from `x-request-id` (or generated) and
/// the configured deadline.
pub struct RequestCtx(pub RequestContext);

impl<M, S> FromRequestParts<Arc<AppState<M, S>>> for RequestCtx
where
    M: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<M, S>>,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_owned)
            .unwrap_or_else(generate_request_id);

        let mut ctx = RequestContext::with_request_id(request_id);
        if let Some(timeout) = state.request_timeout {
            ctx = ctx.with_deadline(Instant::now() + timeout);
        }
        Ok(Self(ctx))
    }
}

/// JSON body whose decoding failures render as `validation_error`
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ApiError::Validation(ValidationError::Malformed {
                part: "request body",
                detail: rejection.body_text(),
            })
        })?;
        Ok(Self(value))
    }
}

/// Query string whose decoding failures render as `validation_error`
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::Validation(ValidationError::Malformed {
                    part: "query string",
                    detail: rejection.body_text(),
                })
            })?;
        Ok(Self(value))
    }
}

//! Article endpoints
//!
//! Wire names are camelCase (`authorName`, `sortBy`, `authorId`,
//! `createdAt`, `recordsCount`). Sort values stay snake_case
//! (`created_at`, `author_name`).

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::transaction::TransactionManager;
use crate::http::error::ApiError;
use crate::http::extractors::{RequestCtx, ValidJson, ValidQuery};
use crate::http::server::AppState;
use crate::models::{Article, ListArticles, NewArticle, Paginated, SortColumn, SortDirection};
use crate::search::ArticleSearch;

/// Query parameters for GET /v1/articles
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArticlesParams {
    pub query: Option<String>,
    pub author_name: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

impl TryFrom<ListArticlesParams> for ListArticles {
    type Error = ApiError;

    fn try_from(p: ListArticlesParams) -> Result<Self, Self::Error> {
        let sort_by = non_blank(p.sort_by)
            .map(|s| s.parse::<SortColumn>())
            .transpose()?;
        let sort_direction = non_blank(p.sort_direction)
            .map(|s| s.parse::<SortDirection>())
            .transpose()?;

        Ok(Self {
            query: non_blank(p.query),
            author_name: non_blank(p.author_name),
            sort_by,
            sort_direction,
            limit: lenient_number(p.limit),
            page: lenient_number(p.page),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Missing or non-numeric values read as 0, which pagination treats as
/// "use the default".
fn lenient_number(value: Option<String>) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Create article request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: String,
    pub body: String,
    pub author_id: String,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct AuthorResponse {
    pub id: Uuid,
    pub name: String,
}

/// Article response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub author: AuthorResponse,
}

impl From<Article> for ArticleResponse {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            body: a.body,
            created_at: a.created_at.to_rfc3339(),
            author: AuthorResponse {
                id: a.author.id,
                name: a.author.name,
            },
        }
    }
}

/// Listing response: `recordsCount` is the total across all pages
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArticlesResponse {
    pub records_count: i64,
    pub articles: Vec<ArticleResponse>,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl From<Paginated<ArticleResponse>> for ListArticlesResponse {
    fn from(p: Paginated<ArticleResponse>) -> Self {
        let total_pages = p.total_pages();
        Self {
            records_count: p.total,
            articles: p.items,
            page: p.page,
            per_page: p.per_page,
            total_pages,
        }
    }
}

/// GET /v1/articles - filtered, sorted, paged listing
async fn list_articles<M, S>(
    State(state): State<Arc<AppState<M, S>>>,
    RequestCtx(ctx): RequestCtx,
    ValidQuery(params): ValidQuery<ListArticlesParams>,
) -> Result<Json<ListArticlesResponse>, ApiError>
where
    M: TransactionManager,
    S: ArticleSearch,
{
    let req = ListArticles::try_from(params)?;
    let page = state.service.list_articles(&ctx, req).await?;
    Ok(Json(page.map(ArticleResponse::from).into()))
}

/// POST /v1/articles - create an article for an existing author
async fn create_article<M, S>(
    State(state): State<Arc<AppState<M, S>>>,
    RequestCtx(ctx): RequestCtx,
    ValidJson(req): ValidJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError>
where
    M: TransactionManager,
    S: ArticleSearch,
{
    let new = NewArticle::new(&req.title, &req.body, &req.author_id)?;
    let id = state.service.create_article(&ctx, new).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Article routes
pub fn router<M, S>() -> Router<Arc<AppState<M, S>>>
where
    M: TransactionManager,
    S: ArticleSearch,
{
    Router::new().route(
        "/v1/articles",
        get(list_articles::<M, S>).post(create_article::<M, S>),
    )
}

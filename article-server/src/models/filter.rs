//! Article listing filter and sort options

use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use super::ValidationError;

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    CreatedAt,
    Title,
    AuthorName,
}

impl SortColumn {
    /// Fully qualified column in the articles/authors join.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "articles.created_at",
            Self::Title => "articles.title",
            Self::AuthorName => "authors.name",
        }
    }
}

impl FromStr for SortColumn {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "title" => Ok(Self::Title),
            "author_name" => Ok(Self::AuthorName),
            other => Err(ValidationError::InvalidVariant {
                field: "sortBy",
                value: other.to_owned(),
            }),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ValidationError::InvalidVariant {
                field: "sortDirection",
                value: other.to_owned(),
            }),
        }
    }
}

/// Filter for listing and counting articles.
///
/// Built once per request from validated input. Empty `ids` and an empty or
/// absent `author_name` mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub ids: Vec<Uuid>,
    pub author_name: Option<String>,
    pub sort_by: Option<SortColumn>,
    pub sort_direction: Option<SortDirection>,
    pub limit: i64,
    pub offset: i64,
}

impl ArticleFilter {
    /// Sort actually applied: the requested pair when both halves are given,
    /// otherwise newest first.
    pub fn effective_sort(&self) -> (SortColumn, SortDirection) {
        match (self.sort_by, self.sort_direction) {
            (Some(column), Some(direction)) => (column, direction),
            _ => (SortColumn::CreatedAt, SortDirection::Desc),
        }
    }
}

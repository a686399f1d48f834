//! Article and author entities plus validated service input

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::filter::{SortColumn, SortDirection};
use super::validation::{required_text, ValidationError};

/// Maximum length for article titles
const MAX_TITLE_LEN: usize = 256;

/// Maximum length for article bodies
const MAX_BODY_LEN: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

/// Validated input for creating an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    title: String,
    body: String,
    author_id: Uuid,
}

impl NewArticle {
    /// # Rules
    /// - Title and body non-empty after trimming
    /// - Title at most 256 characters
    /// - Author id is a UUID
    ///
    /// # Example
    /// ```
    /// use article_server::models::NewArticle;
    ///
    /// let id = "0197da8f-47ed-78b1-7b0f-ea4f4a1af25e";
    /// assert!(NewArticle::new("Title", "Body", id).is_ok());
    /// assert!(NewArticle::new("", "Body", id).is_err());
    /// assert!(NewArticle::new("Title", "Body", "nope").is_err());
    /// ```
    pub fn new(title: &str, body: &str, author_id: &str) -> Result<Self, ValidationError> {
        let title = required_text("title", title, MAX_TITLE_LEN)?;
        let body = required_text("body", body, MAX_BODY_LEN)?;
        let author_id = Uuid::parse_str(author_id.trim()).map_err(|_| {
            ValidationError::InvalidFormat {
                field: "authorId",
                reason: "invalid UUID format",
            }
        })?;

        Ok(Self {
            title,
            body,
            author_id,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// Listing request as seen by the service layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArticles {
    /// Free-text query answered by the search index
    pub query: Option<String>,
    pub author_name: Option<String>,
    pub sort_by: Option<SortColumn>,
    pub sort_direction: Option<SortDirection>,
    pub limit: i64,
    /// 1-indexed
    pub page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHOR: &str = "0197da8f-47ed-78b1-7b0f-ea4f4a1af25e";

    #[test]
    fn trims_fields() {
        let article = NewArticle::new("  Title ", " Body ", AUTHOR).unwrap();
        assert_eq!(article.title(), "Title");
        assert_eq!(article.body(), "Body");
        assert_eq!(article.author_id().to_string(), AUTHOR);
    }

    #[test]
    fn rejects_blank_body() {
        assert_eq!(
            NewArticle::new("Title", "  ", AUTHOR).unwrap_err(),
            ValidationError::Empty { field: "body" }
        );
    }

    #[test]
    fn rejects_long_title() {
        let title = "a".repeat(257);
        assert!(matches!(
            NewArticle::new(&title, "Body", AUTHOR).unwrap_err(),
            ValidationError::TooLong { max: 256, .. }
        ));
    }

    #[test]
    fn rejects_bad_author_id() {
        assert!(matches!(
            NewArticle::new("Title", "Body", "123").unwrap_err(),
            ValidationError::InvalidFormat { field: "authorId", .. }
        ));
    }
}

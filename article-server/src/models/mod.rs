//! Domain models with validation at construction
//!
//! All request input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod article;
pub mod filter;
pub mod pagination;
pub mod validation;

pub use article::{Article, Author, ListArticles, NewArticle};
pub use filter::{ArticleFilter, SortColumn, SortDirection};
pub use pagination::{clamp_limit, compute_offset, Paginated};
pub use validation::ValidationError;

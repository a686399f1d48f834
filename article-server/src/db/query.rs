//! Structured SQL assembly for article listing and counting
//!
//! Optional filters become an ordered list of [`Predicate`]s. Rendering walks
//! that list once against a running [`Params`] list, which hands out `$n`
//! placeholders in binding order, so parameter numbering never depends on SQL
//! text manipulation. Sort columns come from enums; caller input only ever
//! reaches the database as bound parameters.

use uuid::Uuid;

use crate::db::client::{SqlValue, Statement};
use crate::models::filter::ArticleFilter;
use crate::models::pagination::clamp_limit;

const ARTICLE_COLUMNS: &str = "articles.id, articles.title, articles.body, articles.created_at, \
                               authors.id, authors.name";

const ARTICLES_JOIN_AUTHORS: &str = "FROM articles JOIN authors ON articles.author_id = authors.id";

/// Positional parameters collected while rendering.
#[derive(Debug, Default)]
pub struct Params {
    values: Vec<SqlValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder.
    pub fn push(&mut self, value: impl Into<SqlValue>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// One optional clause of a WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `articles.id IN (...)`
    IdIn(Vec<Uuid>),
    /// Case-insensitive substring match on the author's name.
    AuthorNameContains(String),
}

impl Predicate {
    fn render(&self, params: &mut Params) -> String {
        match self {
            Self::IdIn(ids) => {
                let placeholders: Vec<String> = ids.iter().map(|id| params.push(*id)).collect();
                format!("articles.id IN ({})", placeholders.join(", "))
            }
            Self::AuthorNameContains(name) => {
                let placeholder = params.push(contains_pattern(name));
                format!("LOWER(authors.name) LIKE LOWER({placeholder})")
            }
        }
    }
}

/// Predicates implied by `filter`, in rendering order: ids, then author name.
pub fn predicates(filter: &ArticleFilter) -> Vec<Predicate> {
    let mut out = Vec::new();
    if !filter.ids.is_empty() {
        out.push(Predicate::IdIn(filter.ids.clone()));
    }
    if let Some(name) = filter.author_name.as_deref().filter(|n| !n.is_empty()) {
        out.push(Predicate::AuthorNameContains(name.to_owned()));
    }
    out
}

/// `WHERE a AND b`, or `None` when there is nothing to filter on.
pub fn render_where(predicates: &[Predicate], params: &mut Params) -> Option<String> {
    if predicates.is_empty() {
        return None;
    }
    let clauses: Vec<String> = predicates.iter().map(|p| p.render(params)).collect();
    Some(format!("WHERE {}", clauses.join(" AND ")))
}

/// Paged, sorted article listing joined with authors.
pub fn list_statement(filter: &ArticleFilter) -> Statement {
    let mut params = Params::new();
    let mut sql = format!("SELECT {ARTICLE_COLUMNS} {ARTICLES_JOIN_AUTHORS}");

    if let Some(clause) = render_where(&predicates(filter), &mut params) {
        sql.push(' ');
        sql.push_str(&clause);
    }

    let (column, direction) = filter.effective_sort();
    sql.push_str(&format!(" ORDER BY {} {}", column.column(), direction.as_sql()));

    let limit = params.push(clamp_limit(filter.limit));
    let offset = params.push(filter.offset.max(0));
    sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));

    Statement {
        sql,
        params: params.into_values(),
    }
}

/// Total rows matching the same predicates as [`list_statement`].
pub fn count_statement(filter: &ArticleFilter) -> Statement {
    let mut params = Params::new();
    let mut sql = format!("SELECT COUNT(*) {ARTICLES_JOIN_AUTHORS}");

    if let Some(clause) = render_where(&predicates(filter), &mut params) {
        sql.push(' ');
        sql.push_str(&clause);
    }

    Statement {
        sql,
        params: params.into_values(),
    }
}

/// `%name%` with LIKE metacharacters escaped, so the match is a literal
/// substring.
pub fn contains_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 2);
    pattern.push('%');
    for ch in name.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Borrows an already-resolved connection (pool or open unit of work)
//! - Builds parameterized statements, never interpolates input
//! - Translates every raw client error into exactly one `DbError` kind

pub mod articles;
pub mod authors;

pub use articles::ArticleRepo;
pub use authors::AuthorRepo;

/// Repository error taxonomy.
///
/// Kinds, not identities: no raw driver error type crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    #[error("start transaction failed")]
    TransactionStartFailed,

    #[error("commit transaction failed")]
    TransactionCommitFailed,

    #[error("{operation} query failed")]
    QueryFailed { operation: &'static str },

    #[error("{operation} returned a malformed row")]
    RowScanFailed { operation: &'static str },

    #[error("create {resource} record failed")]
    InsertFailed { resource: &'static str },

    #[error("create {resource} record affected no rows")]
    NoRowsAffected { resource: &'static str },

    #[error("not found: {resource} '{id}'")]
    RecordNotFound { resource: &'static str, id: String },
}

impl DbError {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransactionStartFailed => "transaction_start_failed",
            Self::TransactionCommitFailed => "transaction_commit_failed",
            Self::QueryFailed { .. } => "query_failed",
            Self::RowScanFailed { .. } => "row_scan_failed",
            Self::InsertFailed { .. } => "insert_failed",
            Self::NoRowsAffected { .. } => "no_rows_affected",
            Self::RecordNotFound { .. } => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_operation() {
        let err = DbError::QueryFailed {
            operation: "article list",
        };
        assert_eq!(err.to_string(), "article list query failed");
    }

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            DbError::TransactionStartFailed,
            DbError::TransactionCommitFailed,
            DbError::QueryFailed { operation: "x" },
            DbError::RowScanFailed { operation: "x" },
            DbError::InsertFailed { resource: "x" },
            DbError::NoRowsAffected { resource: "x" },
            DbError::RecordNotFound {
                resource: "x",
                id: "1".into(),
            },
        ];
        let mut codes: Vec<_> = kinds.iter().map(DbError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}

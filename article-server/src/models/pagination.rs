//! Pagination helpers
//!
//! `clamp_limit` and `compute_offset` are total: every input maps to a usable
//! LIMIT/OFFSET pair.

/// Maximum items per page
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Default items per page
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Normalise a requested page size.
///
/// - `<= 0` falls back to the default (20)
/// - anything above 100 is capped at 100
pub fn clamp_limit(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        requested.min(MAX_PAGE_LIMIT)
    }
}

/// SQL OFFSET for a 1-indexed page.
pub fn compute_offset(page: i64, limit: i64) -> i64 {
    if page <= 1 {
        0
    } else {
        (page - 1).saturating_mul(limit.max(0))
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> Paginated<T> {
    pub fn empty(page: i64, per_page: i64) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            per_page,
        }
    }

    /// Calculate total number of pages.
    pub fn total_pages(&self) -> i64 {
        if self.total <= 0 || self.per_page <= 0 {
            1
        } else {
            ((self.total + self.per_page - 1) / self.per_page).max(1)
        }
    }

    /// Convert items, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

//! Offset pagination shared by room, message and notification listings.

use serde::Serialize;

/// 1-indexed page request translated to `skip`/`limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 40;
    pub const MAX_LIMIT: u32 = 100;

    /// Build from raw query values.
    ///
    /// Missing or non-positive values fall back to the defaults; the limit is
    /// capped at `max_limit`.
    pub fn from_query(page: Option<i64>, limit: Option<i64>, default_limit: u32, max_limit: u32) -> Self {
        let page = page
            .filter(|p| *p > 0)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(Self::DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .map(|l| l.min(max_limit as i64) as u32)
            .unwrap_or(default_limit.min(max_limit));

        Self { page, limit }
    }

    pub fn new(page: u32, limit: u32) -> Self {
        Self::from_query(Some(page as i64), Some(limit as i64), Self::DEFAULT_LIMIT, Self::MAX_LIMIT)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip: `(page - 1) * limit`
    pub fn skip(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Slice an already-ordered in-memory result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip() as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the total number of matching records.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new(), total: 0 }
    }
}

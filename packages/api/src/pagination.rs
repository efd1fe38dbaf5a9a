// ABOUTME: Pagination utilities for list endpoints
// ABOUTME: Page/limit query parameters and the paginated response wrapper

use serde::{Deserialize, Serialize};

/// Default page size for paginated queries
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size to prevent performance issues
pub const MAX_PAGE_SIZE: i64 = 100;

/// Minimum page number (1-indexed)
pub const MIN_PAGE: i64 = 1;

/// Largest page whose offset still fits in an i64 at the maximum page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Query parameters for pagination
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-indexed, defaults to 1)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Items per page (defaults to DEFAULT_PAGE_SIZE, max MAX_PAGE_SIZE)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    MIN_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl PaginationParams {
    pub fn with_page_and_limit(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Normalized (limit, offset) for SQL
    pub fn validate(&self) -> (i64, i64) {
        let page = self.page();
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        (limit, (page - 1) * limit)
    }

    pub fn limit(&self) -> i64 {
        self.validate().0
    }

    pub fn offset(&self) -> i64 {
        self.validate().1
    }

    pub fn page(&self) -> i64 {
        self.page.clamp(MIN_PAGE, MAX_PAGE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::with_page_and_limit(MIN_PAGE, DEFAULT_PAGE_SIZE)
    }
}

/// Metadata about pagination state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMeta {
    pub fn new(params: &PaginationParams, total_items: i64) -> Self {
        let page = params.page();
        let page_size = params.limit();
        let total_pages = (total_items + page_size - 1) / page_size;

        Self {
            page,
            page_size,
            total_items,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > MIN_PAGE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total_items: i64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(params, total_items),
        }
    }
}

use serde::{Deserialize, Serialize};

use super::storage::Row;

/// One page of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Rows on this page.
    pub items: Vec<Row>,

    /// Total count (before paging).
    pub total: u64,

    /// Current page number (1-indexed).
    pub page: u32,

    /// Items per page.
    pub per_page: u32,

    /// Total number of pages.
    pub total_pages: u32,

    /// Whether there's a next page.
    pub has_next: bool,

    /// Whether there's a previous page.
    pub has_prev: bool,
}

impl Page {
    /// Create a new page with paging calculations.
    pub fn new(items: Vec<Row>, total: u64, page: u32, per_page: u32) -> Self {
        let total_pages = if per_page > 0 {
            u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
        } else {
            1
        };

        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    /// Create an empty page.
    pub fn empty(page: u32, per_page: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            per_page,
            total_pages: 0,
            has_next: false,
            has_prev: false,
        }
    }
}

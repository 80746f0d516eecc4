//! Page-based pagination.

use crate::clause::{Clause, ClauseKind};
use serde::{Deserialize, Serialize};

/// Page size used when neither the request nor the options set one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// One-based page selection.
///
/// Page `0` and page `1` both select the first page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            page_size: None,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Rows per page.
    pub fn limit(&self, default_size: u32) -> u32 {
        self.page_size.unwrap_or(default_size)
    }

    /// Rows skipped before the page.
    pub fn offset(&self, default_size: u32) -> u64 {
        match self.page {
            0 => 0,
            page => u64::from(page - 1) * u64::from(self.limit(default_size)),
        }
    }

    /// The LIMIT and OFFSET fragments, in that order.
    pub fn clauses(&self, default_size: u32) -> [Clause; 2] {
        [
            Clause::new(ClauseKind::Limit, self.limit(default_size).to_string()),
            Clause::new(ClauseKind::Offset, self.offset(default_size).to_string()),
        ]
    }
}

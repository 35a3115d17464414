//! Paging primitives shared by searches and scans.

use serde::{Deserialize, Serialize};

/// Requested window over a sorted result set.
///
/// Built either from a 1-based page number and page size, or from a raw
/// offset and limit. The size is always capped at [`Paging::MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Paging {
    offset: usize,
    limit: usize,
}

impl Paging {
    /// Maximum items per page.
    pub const MAX_PAGE_SIZE: usize = 500;

    /// Default items per page.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn page(page: usize, page_size: usize) -> Self {
        let limit = Self::clamp_size(page_size);
        let page = page.max(1);
        Self {
            offset: (page - 1).saturating_mul(limit),
            limit,
        }
    }

    pub fn offset(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Self::clamp_size(limit),
        }
    }

    fn clamp_size(size: usize) -> usize {
        size.clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn start(&self) -> usize {
        self.offset
    }

    /// 1-based page index of the window start.
    pub fn current_page(&self) -> usize {
        self.offset / self.limit + 1
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::page(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// Paged result envelope.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T: Serialize> PagedResult<T> {
    pub fn new(items: Vec<T>, total: usize, paging: &Paging) -> Self {
        let page_size = paging.limit();
        let total_pages = total.div_ceil(page_size);
        Self {
            items,
            total,
            page: paging.current_page(),
            page_size,
            total_pages,
        }
    }
}

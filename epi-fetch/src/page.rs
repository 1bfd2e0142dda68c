use serde::{Deserialize, Serialize};

/// The number of pages needed for `total` items, `0` when there are no items.
pub fn total_pages_for(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// One page of results, as held by a [`crate::PaginatedStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page, in backend order.
    pub items: Vec<T>,
    /// The total number of items across all pages.
    pub total: u64,
    /// The 1-based page number.
    pub page: u32,
    /// The requested page size.
    pub page_size: u32,
    /// Always `ceil(total / page_size)`.
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Create a page, deriving `total_pages` from `total` and `page_size`.
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total_pages_for(total, page_size),
        }
    }

    /// An empty first page.
    pub fn empty(page_size: u32) -> Self {
        Self::new(vec![], 0, 1, page_size)
    }

    /// Map the items, keeping the pagination info.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// The canonical paginated response envelope returned by the backend list endpoints:
///
/// ```json
/// { "data": [...], "total": 47, "page": 1, "pageSize": 10, "totalPages": 5 }
/// ```
///
/// Older endpoints use `items` instead of `data` and `limit` instead of `pageSize`, both are accepted.
/// Missing pagination fields fall back to the requested values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    /// The page items.
    #[serde(alias = "items")]
    pub data: Vec<T>,
    /// The total across all pages.
    #[serde(default)]
    pub total: Option<u64>,
    /// The 1-based page number.
    #[serde(default)]
    pub page: Option<u32>,
    /// The page size.
    #[serde(default, alias = "limit")]
    pub page_size: Option<u32>,
    /// The page count as reported by the backend, recomputed locally.
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl<T> PageEnvelope<T> {
    /// Convert into a [`Page`], using the requested page and page size where the backend omitted them.
    pub fn into_page(self, requested_page: u32, requested_page_size: u32) -> Page<T> {
        let total = self.total.unwrap_or(self.data.len() as u64);
        let page = self.page.unwrap_or(requested_page);
        let page_size = self.page_size.unwrap_or(requested_page_size);
        if let Some(reported) = self.total_pages {
            let computed = total_pages_for(total, page_size.max(1));
            if reported != computed {
                tracing::debug!(
                    reported,
                    computed,
                    "backend totalPages disagrees with total/pageSize, using computed value"
                );
            }
        }
        Page::new(self.data, total, page, page_size)
    }
}

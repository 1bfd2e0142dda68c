use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Sort direction sent to the backend as the `order` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// The wire value, `"asc"` or `"desc"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A sort field and its direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// The backend field name to sort on.
    pub field: String,
    /// The direction to sort in.
    pub direction: SortDirection,
}

impl Sort {
    /// Create a new [`Sort`].
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// The full set of parameters describing one page request.
///
/// Two requests with equal params share the same [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryParams {
    /// The 1-based page number.
    pub page: u32,
    /// The maximum number of items per page.
    pub page_size: u32,
    /// Optional sorting.
    pub sort: Option<Sort>,
    /// Optional free-text search, never `Some("")`.
    pub search: Option<String>,
    /// Entity specific filters, sorted by name.
    pub filters: BTreeMap<String, String>,
}

impl QueryParams {
    /// Params for the first page at the given page size, with no sort, search or filters.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            sort: None,
            search: None,
            filters: BTreeMap::new(),
        }
    }

    /// The deterministic cache key for these params.
    pub fn cache_key(&self) -> CacheKey {
        // Field order is fixed by the struct and filters are a BTreeMap, so the json is stable.
        CacheKey(serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}")))
    }

    /// The query string pairs understood by the backend list endpoints.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.page_size.to_string()),
        ];
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.field.clone()));
            pairs.push(("order".to_string(), sort.direction.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        pairs.extend(
            self.filters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        pairs
    }
}

/// Serialized [`QueryParams`], used to key the page cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// The serialized params.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A partial update merged into the params a store holds.
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsPatch {
    /// Replace the page.
    pub page: Option<u32>,
    /// Replace the page size.
    pub page_size: Option<u32>,
    /// Replace the sort, `Some(None)` clears it.
    pub sort: Option<Option<Sort>>,
    /// Replace the search, an empty string clears it.
    pub search: Option<String>,
    /// Replace the whole filter map.
    pub filters: Option<BTreeMap<String, String>>,
}

impl ParamsPatch {
    /// An empty patch, leaving the params unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Request a specific page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set or clear the sort.
    pub fn with_sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the search term, an empty string clears it.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Replace the filter map.
    pub fn with_filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Merge into `params`.
    pub fn apply(self, params: &mut QueryParams) {
        if let Some(page) = self.page {
            params.page = page;
        }
        if let Some(page_size) = self.page_size {
            params.page_size = page_size.max(1);
        }
        if let Some(sort) = self.sort {
            params.sort = sort;
        }
        if let Some(search) = self.search {
            let search = search.trim().to_string();
            params.search = if search.is_empty() { None } else { Some(search) };
        }
        if let Some(filters) = self.filters {
            params.filters = filters;
        }
    }
}

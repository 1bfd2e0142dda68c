use std::time::Duration;

pub(crate) const DEFAULT_PAGE_SIZE: u32 = 10;
pub(crate) const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub(crate) const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Configuration for a [`crate::PaginatedStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    page_size: Option<u32>,
    cache_ttl: Option<Duration>,
    cache_enabled: Option<bool>,
    debounce: Option<Duration>,
}

impl StoreOptions {
    /// Create new [`StoreOptions`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial page size, also restored by [`crate::PaginatedStore::reset`].
    ///
    /// A page size of `0` is treated as `1`.
    ///
    /// Default: `10`
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Set how long a fetched page may be served from the cache.
    ///
    /// Once expired, the entry is dropped and the next request for the same parameters refetches.
    ///
    /// To never expire, set [`std::time::Duration::MAX`].
    ///
    /// Default: `5 minutes`
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    /// Enable or fully bypass the response cache.
    ///
    /// Default: `true`
    pub fn with_cache_enabled(mut self, cache_enabled: bool) -> Self {
        self.cache_enabled = Some(cache_enabled);
        self
    }

    /// Set the delay used to coalesce rapid search and filter changes.
    ///
    /// Default: `300 milliseconds`
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// The initial page size.
    ///
    /// Default: `10`
    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// How long a fetched page may be served from the cache.
    ///
    /// Default: `5 minutes`
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL)
    }

    /// Whether the response cache is used at all.
    ///
    /// Default: `true`
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.unwrap_or(true)
    }

    /// The delay used to coalesce rapid search and filter changes.
    ///
    /// Default: `300 milliseconds`
    pub fn debounce(&self) -> Duration {
        self.debounce.unwrap_or(DEFAULT_DEBOUNCE)
    }
}

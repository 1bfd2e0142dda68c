use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    future::Future,
    sync::{Arc, Weak},
};

use futures::{FutureExt, future::BoxFuture};

use crate::{
    StoreOptions,
    cache::PageCache,
    debounce::DebounceHandle,
    page::Page,
    params::{CacheKey, ParamsPatch, QueryParams, Sort, SortDirection},
    subscriptions::{Subscribers, Subscription},
    utils::{OnDrop, elapsed_ms, new_store_id},
};

type Fetcher<T> =
    Arc<dyn Fn(QueryParams) -> BoxFuture<'static, Result<Page<T>, String>> + Send + Sync>;

/// The informal lifecycle encoded by the `loading` and `error` fields of a [`StoreState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing fetched yet.
    Idle,
    /// A fetch is in flight, previous items (if any) are still shown.
    Loading,
    /// The latest fetch succeeded.
    Loaded,
    /// The latest fetch failed, previous items (if any) are still shown.
    Errored,
}

/// A snapshot of what a [`PaginatedStore`] currently exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<T> {
    /// The items of the latest successfully fetched page.
    pub items: Vec<T>,
    /// The total number of items across all pages.
    pub total: u64,
    /// The 1-based page the items belong to.
    pub page: u32,
    /// The page size the items were fetched with.
    pub page_size: u32,
    /// `ceil(total / page_size)`.
    pub total_pages: u32,
    /// Whether a fetch is in flight.
    pub loading: bool,
    /// The display message of the latest failed fetch, cleared on the next success.
    pub error: Option<String>,
    /// When the visible items were last replaced.
    pub last_fetched_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl<T> StoreState<T> {
    fn initial(page_size: u32) -> Self {
        Self {
            items: vec![],
            total: 0,
            page: 1,
            page_size,
            total_pages: 0,
            loading: false,
            error: None,
            last_fetched_at: None,
        }
    }

    /// The lifecycle stage this snapshot is in.
    pub fn status(&self) -> FetchStatus {
        if self.loading {
            FetchStatus::Loading
        } else if self.error.is_some() {
            FetchStatus::Errored
        } else if self.last_fetched_at.is_some() {
            FetchStatus::Loaded
        } else {
            FetchStatus::Idle
        }
    }

    /// Whether there is a page after the current one.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Whether there is a page before the current one.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    fn apply_page(&mut self, page: Page<T>) {
        self.items = page.items;
        self.total = page.total;
        self.page = page.page;
        self.page_size = page.page_size;
        self.total_pages = page.total_pages;
        self.loading = false;
        self.error = None;
        self.last_fetched_at = Some(chrono::Utc::now());
    }
}

struct Shared<T> {
    params: QueryParams,
    state: StoreState<T>,
    cache: PageCache<T>,
    search_debounce: DebounceHandle,
    filter_debounce: DebounceHandle,
    // Last request wins, responses for an older seq are not displayed:
    latest_seq: u64,
    // Bumped on reset, so fetches started before it don't refill the cleared cache:
    generation: u64,
}

struct StoreInner<T> {
    store_id: u64,
    options: StoreOptions,
    fetcher: Fetcher<T>,
    shared: parking_lot::Mutex<Shared<T>>,
    subscribers: Subscribers<StoreState<T>>,
    // To make sure parallel fetches for the same params aren't happening.
    fetcher_mutexes: parking_lot::Mutex<HashMap<CacheKey, FetcherSlot>>,
}

struct FetcherSlot {
    mutex: Arc<futures::lock::Mutex<()>>,
    // Callers currently holding or waiting on the mutex, the slot is removed when this hits 0:
    users: usize,
}

/// A paginated view over a backend list endpoint, with response caching and debounced search/filters.
///
/// Cheap to clone, all clones share the same state, cache and subscribers.
///
/// None of the methods return errors, a failed fetch is reported through [`StoreState::error`]
/// while the previously loaded items stay visible.
///
/// # Example
///
/// ```no_run
/// use epi_fetch::{Page, PaginatedStore, ParamsPatch, QueryParams, StoreOptions};
///
/// # async fn run() {
/// let store = PaginatedStore::new(
///     |params: QueryParams| async move {
///         Ok::<_, std::io::Error>(Page::new(vec!["luva"], 1, params.page, params.page_size))
///     },
///     StoreOptions::new().with_page_size(20),
/// );
/// let _sub = store.subscribe(|state| println!("{} items", state.items.len()));
/// store.fetch_page(ParamsPatch::new()).await;
/// assert!(!store.is_empty());
/// # }
/// ```
pub struct PaginatedStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for PaginatedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for PaginatedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedStore")
            .field("store_id", &self.inner.store_id)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl<T> PaginatedStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new store around a page fetcher.
    ///
    /// The fetcher receives the full params for every page that isn't served from the cache.
    /// Nothing is fetched until one of the fetching methods is called.
    pub fn new<F, Fut, E>(fetcher: F, options: StoreOptions) -> Self
    where
        F: Fn(QueryParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move |params: QueryParams| {
            let fut = fetcher(params);
            async move { fut.await.map_err(|e| e.to_string()) }.boxed()
        });
        let page_size = options.page_size();
        Self {
            inner: Arc::new(StoreInner {
                store_id: new_store_id(),
                options,
                fetcher,
                shared: parking_lot::Mutex::new(Shared {
                    params: QueryParams::new(page_size),
                    state: StoreState::initial(page_size),
                    cache: PageCache::default(),
                    search_debounce: DebounceHandle::default(),
                    filter_debounce: DebounceHandle::default(),
                    latest_seq: 0,
                    generation: 0,
                }),
                subscribers: Subscribers::default(),
                fetcher_mutexes: parking_lot::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Merge `patch` into the held params and fetch that page, from the cache when possible.
    ///
    /// On success the visible state is replaced by the new page.
    /// On failure `error` is set and the previous items stay visible.
    /// If a newer fetch was started in the meantime, this one's result isn't displayed.
    ///
    /// A patch requesting page `0` is ignored.
    pub async fn fetch_page(&self, patch: ParamsPatch) {
        if patch.page == Some(0) {
            tracing::debug!(store_id = self.inner.store_id, "ignoring request for page 0");
            return;
        }

        let (params, seq, generation) = {
            let mut shared = self.inner.shared.lock();
            patch.apply(&mut shared.params);
            shared.latest_seq += 1;
            shared.state.loading = true;
            (shared.params.clone(), shared.latest_seq, shared.generation)
        };
        self.notify();

        // Only acts when the future is dropped before finishing, completion already clears loading:
        let _settle_loading = OnDrop::new(|| {
            let cleared = {
                let mut shared = self.inner.shared.lock();
                let cleared = shared.latest_seq == seq && shared.state.loading;
                if cleared {
                    shared.state.loading = false;
                }
                cleared
            };
            if cleared {
                tracing::debug!(
                    store_id = self.inner.store_id,
                    seq,
                    "page fetch dropped before completing"
                );
                self.notify();
            }
        });

        let result = self.inner.cached_or_fetch(&params, generation).await;

        {
            let mut shared = self.inner.shared.lock();
            if shared.latest_seq != seq {
                tracing::debug!(
                    store_id = self.inner.store_id,
                    seq,
                    latest_seq = shared.latest_seq,
                    "discarding superseded page response"
                );
                return;
            }
            match result {
                Ok(page) => shared.state.apply_page(page),
                Err(message) => {
                    shared.state.loading = false;
                    shared.state.error = Some(message);
                }
            }
        }
        self.notify();
    }

    /// Replace the filters and fetch the first page once the debounce delay passes without another call.
    pub fn set_filters(&self, filters: BTreeMap<String, String>) {
        let patch = ParamsPatch::new().with_filters(filters).with_page(1);
        let task = self.debounced_fetch(patch);
        self.inner
            .shared
            .lock()
            .filter_debounce
            .schedule(self.inner.options.debounce(), task);
    }

    /// Replace the search term and fetch the first page once the debounce delay passes without another call.
    ///
    /// An empty or whitespace only term clears the search.
    pub fn set_search(&self, search: impl Into<String>) {
        let patch = ParamsPatch::new().with_search(search).with_page(1);
        let task = self.debounced_fetch(patch);
        self.inner
            .shared
            .lock()
            .search_debounce
            .schedule(self.inner.options.debounce(), task);
    }

    /// Sort by `field` and immediately fetch the first page.
    pub async fn set_sorting(&self, field: impl Into<String>, direction: SortDirection) {
        self.fetch_page(
            ParamsPatch::new()
                .with_sort(Some(Sort::new(field, direction)))
                .with_page(1),
        )
        .await
    }

    /// Change the page size and immediately fetch the first page.
    pub async fn set_page_size(&self, page_size: u32) {
        self.fetch_page(ParamsPatch::new().with_page_size(page_size).with_page(1))
            .await
    }

    /// Fetch the page after the visible one, does nothing when already on the last page.
    pub async fn next_page(&self) {
        let target = {
            let shared = self.inner.shared.lock();
            shared.state.has_next().then_some(shared.state.page + 1)
        };
        match target {
            Some(page) => self.fetch_page(ParamsPatch::new().with_page(page)).await,
            None => tracing::trace!(store_id = self.inner.store_id, "already on the last page"),
        }
    }

    /// Fetch the page before the visible one, does nothing when already on the first page.
    pub async fn prev_page(&self) {
        let target = {
            let shared = self.inner.shared.lock();
            shared.state.has_prev().then(|| shared.state.page - 1)
        };
        match target {
            Some(page) => self.fetch_page(ParamsPatch::new().with_page(page)).await,
            None => tracing::trace!(store_id = self.inner.store_id, "already on the first page"),
        }
    }

    /// Fetch a specific page.
    ///
    /// Only `page >= 1` is checked, the upper bound is left to the caller and the backend.
    pub async fn go_to_page(&self, page: u32) {
        if page < 1 {
            tracing::debug!(store_id = self.inner.store_id, "ignoring request for page 0");
            return;
        }
        self.fetch_page(ParamsPatch::new().with_page(page)).await
    }

    /// Drop the cache entry for the current params and fetch them again.
    pub async fn reload(&self) {
        {
            let mut shared = self.inner.shared.lock();
            let key = shared.params.cache_key();
            shared.cache.invalidate(&key);
        }
        self.fetch_page(ParamsPatch::new()).await
    }

    /// Back to the first page at the initial page size, with an empty cache and empty state.
    ///
    /// Pending debounced fetches are cancelled and in-flight fetches won't be displayed.
    pub fn reset(&self) {
        let page_size = self.inner.options.page_size();
        {
            let mut shared = self.inner.shared.lock();
            shared.search_debounce.cancel();
            shared.filter_debounce.cancel();
            shared.params = QueryParams::new(page_size);
            shared.cache.clear();
            shared.state = StoreState::initial(page_size);
            shared.latest_seq += 1;
            shared.generation += 1;
        }
        self.inner.fetcher_mutexes.lock().clear();
        tracing::debug!(store_id = self.inner.store_id, "store reset");
        self.notify();
    }

    /// Register a listener called with the new state after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StoreState<T>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.subscribers.subscribe(listener)
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> StoreState<T> {
        self.inner.shared.lock().state.clone()
    }

    /// Whether there is a page after the current one.
    pub fn has_next(&self) -> bool {
        self.inner.shared.lock().state.has_next()
    }

    /// Whether there is a page before the current one.
    pub fn has_prev(&self) -> bool {
        self.inner.shared.lock().state.has_prev()
    }

    /// Whether no items are currently visible.
    pub fn is_empty(&self) -> bool {
        self.inner.shared.lock().state.items.is_empty()
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.shared.lock().state.loading
    }

    /// The params the next fetch will be merged into.
    pub fn current_params(&self) -> QueryParams {
        self.inner.shared.lock().params.clone()
    }

    /// The options this store was created with.
    pub fn options(&self) -> StoreOptions {
        self.inner.options
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize {
        self.inner.shared.lock().cache.len()
    }

    #[cfg(test)]
    pub(crate) fn fetcher_mutexes_len(&self) -> usize {
        self.inner.fetcher_mutexes.lock().len()
    }

    fn debounced_fetch(&self, patch: ParamsPatch) -> impl Future<Output = ()> + Send + 'static {
        // Weak so a pending timer doesn't keep the store alive:
        let inner = Arc::downgrade(&self.inner);
        async move {
            if let Some(inner) = Weak::upgrade(&inner) {
                PaginatedStore { inner }.fetch_page(patch).await;
            }
        }
    }

    fn notify(&self) {
        let state = self.state();
        self.inner.subscribers.notify(&state);
    }
}

impl<T> StoreInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fetcher_mutex(&self, key: &CacheKey) -> Arc<futures::lock::Mutex<()>> {
        let mut guard = self.fetcher_mutexes.lock();
        let slot = guard.entry(key.clone()).or_insert_with(|| FetcherSlot {
            mutex: Arc::new(futures::lock::Mutex::new(())),
            users: 0,
        });
        slot.users += 1;
        slot.mutex.clone()
    }

    fn release_fetcher_mutex(&self, key: &CacheKey, fetcher_mutex: &Arc<futures::lock::Mutex<()>>) {
        let mut guard = self.fetcher_mutexes.lock();
        // The slot may already be a newer one if the store was reset meanwhile:
        let Some(slot) = guard
            .get_mut(key)
            .filter(|slot| Arc::ptr_eq(&slot.mutex, fetcher_mutex))
        else {
            return;
        };
        slot.users = slot.users.saturating_sub(1);
        if slot.users == 0 {
            guard.remove(key);
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<Page<T>> {
        let cached = self
            .shared
            .lock()
            .cache
            .get(key, self.options.cache_ttl());
        if cached.is_some() {
            tracing::trace!(store_id = self.store_id, %key, "serving page from cache");
        }
        cached
    }

    async fn cached_or_fetch(&self, params: &QueryParams, generation: u64) -> Result<Page<T>, String> {
        if !self.options.cache_enabled() {
            return self.fetch(params).await;
        }

        let key = params.cache_key();
        if let Some(page) = self.cached(&key) {
            return Ok(page);
        }

        let fetcher_mutex = self.fetcher_mutex(&key);
        // Declared before the lock guard so it runs after the lock is released, on every exit path:
        let _release = OnDrop::new(|| self.release_fetcher_mutex(&key, &fetcher_mutex));
        let _fetcher_guard = match fetcher_mutex.try_lock() {
            Some(fetcher_guard) => fetcher_guard,
            None => {
                // If have to wait, should check cache again in case it was fetched while waiting.
                let fetcher_guard = fetcher_mutex.lock().await;
                if let Some(page) = self.cached(&key) {
                    return Ok(page);
                }
                fetcher_guard
            }
        };

        let result = self.fetch(params).await;
        if let Ok(page) = &result {
            let mut shared = self.shared.lock();
            if shared.generation == generation {
                shared
                    .cache
                    .insert(key.clone(), page.clone(), self.options.cache_ttl());
            }
        }
        result
    }

    async fn fetch(&self, params: &QueryParams) -> Result<Page<T>, String> {
        let started_at = chrono::Utc::now();
        tracing::debug!(
            store_id = self.store_id,
            page = params.page,
            page_size = params.page_size,
            "fetching page"
        );
        let result = (self.fetcher)(params.clone()).await;
        match &result {
            Ok(page) => tracing::debug!(
                store_id = self.store_id,
                page = page.page,
                items = page.items.len(),
                total = page.total,
                elapsed_ms = elapsed_ms(started_at),
                "fetched page"
            ),
            Err(message) => tracing::warn!(
                store_id = self.store_id,
                page = params.page,
                elapsed_ms = elapsed_ms(started_at),
                "page fetch failed: {message}"
            ),
        }
        result
    }
}

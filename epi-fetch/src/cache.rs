use std::{collections::HashMap, time::Duration};

use crate::{page::Page, params::CacheKey, utils::safe_dt_dur_add};

#[derive(Debug)]
struct CacheEntry<T> {
    page: Page<T>,
    fetched_at: chrono::DateTime<chrono::Utc>,
}

impl<T> CacheEntry<T> {
    fn expired(&self, ttl: Duration) -> bool {
        safe_dt_dur_add(self.fetched_at, ttl) <= chrono::Utc::now()
    }
}

/// In-memory page cache owned by a single store.
#[derive(Debug)]
pub(crate) struct PageCache<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> PageCache<T> {
    /// A clone of the cached page, if present and younger than `ttl`.
    ///
    /// Expired entries are dropped here rather than revalidated.
    pub fn get(&mut self, key: &CacheKey, ttl: Duration) -> Option<Page<T>>
    where
        T: Clone,
    {
        let expired = self.entries.get(key)?.expired(ttl);
        if expired {
            tracing::trace!(%key, "cache entry expired");
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.page.clone())
    }

    /// Store `page`, dropping every other entry older than `ttl` on the way.
    pub fn insert(&mut self, key: CacheKey, page: Page<T>, ttl: Duration) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(ttl));
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::trace!(pruned, "dropped expired cache entries");
        }
        self.entries.insert(
            key,
            CacheEntry {
                page,
                fetched_at: chrono::Utc::now(),
            },
        );
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

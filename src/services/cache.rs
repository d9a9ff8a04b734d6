// In-memory provider response cache
// One instance per adapter, living for the whole session. Entries are never
// evicted: the working set is bounded by the size of the loaded library.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of asking a provider for a response
#[derive(Debug)]
pub enum Fetch<T> {
    /// Parsed response
    Found(T),
    /// The provider answered, but with nothing usable (404, other non-2xx,
    /// malformed payload). Cached so the id is not asked about again.
    Missing,
    /// Transport failure or missing credentials. Not cached.
    Unavailable,
}

#[derive(Debug)]
enum Entry<T> {
    Found(Arc<T>),
    Missing,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        match self {
            Entry::Found(value) => Entry::Found(Arc::clone(value)),
            Entry::Missing => Entry::Missing,
        }
    }
}

pub struct ResponseCache<T> {
    provider: &'static str,
    entries: RwLock<HashMap<String, Entry<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> ResponseCache<T> {
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Stable cache key: `provider/type/id`
    pub fn key(&self, kind: &str, id: &str) -> String {
        format!("{}/{}/{}", self.provider, kind, id)
    }

    /// Return the cached response for `key`, calling `fetch` only on a miss.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Fetch<T>>,
    {
        let cached = self.entries.read().await.get(key).cloned();
        if let Some(entry) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Using cached {} response for {}", self.provider, key);
            return match entry {
                Entry::Found(value) => Some(value),
                Entry::Missing => None,
            };
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        match fetch().await {
            Fetch::Found(value) => {
                let value = Arc::new(value);
                let mut entries = self.entries.write().await;
                entries.insert(key.to_string(), Entry::Found(Arc::clone(&value)));
                tracing::debug!(
                    "Cached {} response for {} (cache size: {})",
                    self.provider,
                    key,
                    entries.len()
                );
                Some(value)
            }
            Fetch::Missing => {
                self.entries
                    .write()
                    .await
                    .insert(key.to_string(), Entry::Missing);
                None
            }
            Fetch::Unavailable => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

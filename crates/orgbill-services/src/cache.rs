//! Keyed get-or-fetch query cache.
//!
//! Each key owns one entry with a watch channel publishing its state:
//! NotFetched -> Fetching -> Ready | Failed. Concurrent callers for the
//! same key share the in-flight fetch; later callers get the cached value
//! until it goes stale. Entries are LRU-bounded.
//!
//! A fetch abandoned mid-flight (the driving future dropped) resets its
//! entry to NotFetched so that waiters can take over instead of hanging.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::watch;

use crate::keys::QueryKey;
use orgbill_core::AppError;

/// Base delay before the first retry.
pub const BASE_RETRY_BACKOFF_MS: u64 = 100;

/// Maximum delay between retries. Caps exponential backoff so that high
/// retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_MS: u64 = 5_000;

/// Computes backoff for a given attempt (exponential with cap).
#[inline]
fn compute_retry_backoff(attempt: u32) -> Duration {
    let ms = BASE_RETRY_BACKOFF_MS.saturating_mul(2_u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_RETRY_BACKOFF_MS))
}

/// Observable state of one cache entry.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
    NotFetched,
    Fetching,
    Ready { value: T, fetched_at: Instant },
    Failed { error: Arc<AppError>, failed_at: Instant },
}

impl<T> QueryState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, QueryState::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryState::Failed { .. })
    }
}

/// Per-call caching policy. `None` fields fall back to the cache's
/// defaults.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub enabled: bool,
    /// How long a Ready value counts as fresh.
    pub stale_time: Option<Duration>,
    /// Retry count for retryable fetch errors. 0 fails fast.
    pub retry: Option<u32>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
            retry: None,
        }
    }
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// The query was disabled; nothing was fetched and the entry state is
    /// unchanged.
    Disabled,
    Ready(T),
}

impl<T> QueryOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            QueryOutcome::Ready(value) => Some(value),
            QueryOutcome::Disabled => None,
        }
    }
}

struct Entry<T> {
    state: watch::Sender<QueryState<T>>,
}

impl<T> Entry<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::NotFetched);
        Self { state }
    }
}

enum Decision<T> {
    Use(T),
    Wait(watch::Receiver<QueryState<T>>),
    Fetch(Arc<Entry<T>>),
}

/// Resets an entry to NotFetched if the fetch driving it is dropped
/// before publishing a result.
struct ResetOnDrop<T> {
    entry: Arc<Entry<T>>,
    armed: bool,
}

impl<T> Drop for ResetOnDrop<T> {
    fn drop(&mut self) {
        if self.armed {
            self.entry.state.send_replace(QueryState::NotFetched);
        }
    }
}

/// LRU-bounded cache of keyed query entries.
pub struct QueryCache<T> {
    entries: Mutex<LruCache<QueryKey, Arc<Entry<T>>>>,
    default_stale: Duration,
    default_retry: u32,
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    pub fn new(capacity: usize, default_stale: Duration, default_retry: u32) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_stale,
            default_retry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<QueryKey, Arc<Entry<T>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn entry(
        entries: &mut LruCache<QueryKey, Arc<Entry<T>>>,
        key: &QueryKey,
    ) -> Arc<Entry<T>> {
        match entries.get(key) {
            Some(entry) => Arc::clone(entry),
            None => {
                let entry = Arc::new(Entry::new());
                entries.put(key.clone(), Arc::clone(&entry));
                entry
            }
        }
    }

    /// Get-or-fetch the value for `key`.
    ///
    /// A fresh Ready entry is returned without fetching. An in-flight
    /// fetch for the same key is joined, never duplicated. Otherwise the
    /// fetcher runs (with the configured retry policy) and its result is
    /// published to the entry.
    pub async fn query<F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> Result<QueryOutcome<T>, Arc<AppError>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if !options.enabled {
            return Ok(QueryOutcome::Disabled);
        }

        let stale_time = options.stale_time.unwrap_or(self.default_stale);
        let retry = options.retry.unwrap_or(self.default_retry);

        loop {
            // Decide under the map lock so only one caller can move the
            // entry into Fetching.
            let decision = {
                let mut entries = self.lock();
                let entry = Self::entry(&mut entries, key);
                let current = entry.state.borrow().clone();
                match current {
                    QueryState::Ready { value, fetched_at }
                        if fetched_at.elapsed() < stale_time =>
                    {
                        Decision::Use(value)
                    }
                    QueryState::Fetching => Decision::Wait(entry.state.subscribe()),
                    _ => {
                        entry.state.send_replace(QueryState::Fetching);
                        Decision::Fetch(entry)
                    }
                }
            };

            match decision {
                Decision::Use(value) => return Ok(QueryOutcome::Ready(value)),
                Decision::Wait(mut rx) => loop {
                    let state = rx.borrow().clone();
                    match state {
                        QueryState::Ready { value, .. } => {
                            return Ok(QueryOutcome::Ready(value));
                        }
                        QueryState::Failed { error, .. } => return Err(error),
                        // The fetch was abandoned or the entry was evicted
                        // mid-flight; start over and possibly take over.
                        QueryState::NotFetched => break,
                        QueryState::Fetching => {
                            if rx.changed().await.is_err() {
                                break;
                            }
                        }
                    }
                },
                Decision::Fetch(entry) => {
                    return self
                        .run_fetch(key, retry, &fetcher, entry)
                        .await
                        .map(QueryOutcome::Ready);
                }
            }
        }
    }

    async fn run_fetch<F, Fut>(
        &self,
        key: &QueryKey,
        retry: u32,
        fetcher: &F,
        entry: Arc<Entry<T>>,
    ) -> Result<T, Arc<AppError>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut guard = ResetOnDrop {
            entry: Arc::clone(&entry),
            armed: true,
        };

        let mut attempt = 0u32;
        let result = loop {
            match fetcher().await {
                Ok(value) => break Ok(value),
                Err(err) if attempt < retry && err.is_retryable() => {
                    let backoff = compute_retry_backoff(attempt);
                    tracing::warn!(
                        key = %key,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => break Err(Arc::new(err)),
            }
        };
        guard.armed = false;

        match result {
            Ok(value) => {
                entry.state.send_replace(QueryState::Ready {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(key = %key, error = %error, "fetch failed");
                entry.state.send_replace(QueryState::Failed {
                    error: Arc::clone(&error),
                    failed_at: Instant::now(),
                });
                Err(error)
            }
        }
    }

    /// Warm the entry for `key` without exposing the result. Fetch errors
    /// are recorded on the entry and logged, never propagated.
    pub async fn prefetch<F, Fut>(&self, key: &QueryKey, fetcher: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Err(error) = self.query(key, &QueryOptions::default(), fetcher).await {
            tracing::debug!(key = %key, error = %error, "prefetch failed");
        }
    }

    /// Current Ready value for `key`, regardless of freshness.
    pub fn get(&self, key: &QueryKey) -> Option<T> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        let state = entry.state.borrow();
        match &*state {
            QueryState::Ready { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Observe state transitions of the entry for `key`. The entry is
    /// created at NotFetched when it does not exist yet.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<T>> {
        let mut entries = self.lock();
        let entry = Self::entry(&mut entries, key);
        entry.state.subscribe()
    }

    /// Reset the entry for `key` to NotFetched. The next query refetches.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().get(key) {
            entry.state.send_replace(QueryState::NotFetched);
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

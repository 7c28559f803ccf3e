//! Cached access to organization subscriptions.
//!
//! Binds the API client to the query cache: one logical cache entry per
//! organization slug, shared in-flight fetches, and a reusable prefetch
//! trigger for warming entries ahead of need.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use orgbill_api_client::ApiClient;
use orgbill_core::models::OrgSubscription;
use orgbill_core::{AppError, ClientConfig};

use crate::cache::{QueryCache, QueryOptions, QueryOutcome, QueryState};
use crate::keys::{subscription_keys, QueryKey};

/// Read-only accessor for organization billing subscriptions, backed by
/// the shared query cache.
#[derive(Clone)]
pub struct SubscriptionService {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache<OrgSubscription>>,
}

impl SubscriptionService {
    pub fn new(
        client: ApiClient,
        cache_capacity: usize,
        default_stale: Duration,
        default_retry: u32,
    ) -> Self {
        Self {
            client: Arc::new(client),
            cache: Arc::new(QueryCache::new(cache_capacity, default_stale, default_retry)),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, anyhow::Error> {
        let client = ApiClient::from_config(config)?;
        Ok(Self::new(
            client,
            config.cache_capacity,
            Duration::from_secs(config.cache_stale_secs),
            config.fetch_retries,
        ))
    }

    fn key(org_slug: &str) -> QueryKey {
        subscription_keys::org_subscription(org_slug)
    }

    /// Cached read of one organization's subscription.
    ///
    /// The query runs only when a slug is present AND `options.enabled` is
    /// true; otherwise it reports [`QueryOutcome::Disabled`] without
    /// touching the network. Callers may override staleness and retry
    /// through `options`, but cannot force a fetch without a slug.
    pub async fn query_org_subscription(
        &self,
        org_slug: Option<&str>,
        options: &QueryOptions,
    ) -> Result<QueryOutcome<OrgSubscription>, Arc<AppError>> {
        let Some(slug) = org_slug else {
            return Ok(QueryOutcome::Disabled);
        };

        if !options.enabled {
            return Ok(QueryOutcome::Disabled);
        }

        let key = Self::key(slug);
        let client = Arc::clone(&self.client);
        let slug = slug.to_string();
        let fetcher = move || {
            let client = Arc::clone(&client);
            let slug = slug.clone();
            async move { client.get_org_subscription(&slug, None).await }
        };

        self.cache.query(&key, options, fetcher).await
    }

    /// Build a trigger that warms the cache entry for `org_slug`.
    ///
    /// Invoking the trigger is a no-op when no slug was provided.
    /// Re-invocation reuses the same cache key and joins any fetch
    /// already in flight instead of creating duplicate entries.
    pub fn prefetch_org_subscription(&self, org_slug: Option<&str>) -> PrefetchTrigger {
        PrefetchTrigger {
            client: Arc::clone(&self.client),
            cache: Arc::clone(&self.cache),
            slug: org_slug.map(|s| s.to_string()),
        }
    }

    /// Latest Ready value for `org_slug`, if the cache holds one.
    pub fn cached_org_subscription(&self, org_slug: &str) -> Option<OrgSubscription> {
        self.cache.get(&Self::key(org_slug))
    }

    /// Observe entry state transitions for `org_slug`.
    pub fn subscribe_org_subscription(
        &self,
        org_slug: &str,
    ) -> watch::Receiver<QueryState<OrgSubscription>> {
        self.cache.subscribe(&Self::key(org_slug))
    }

    /// Drop the cached record for `org_slug`; the next query refetches.
    pub fn invalidate_org_subscription(&self, org_slug: &str) {
        self.cache.invalidate(&Self::key(org_slug));
    }
}

/// Zero-argument cache-warming trigger returned by
/// [`SubscriptionService::prefetch_org_subscription`].
pub struct PrefetchTrigger {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache<OrgSubscription>>,
    slug: Option<String>,
}

impl PrefetchTrigger {
    /// Start warming the cache entry. Returns the handle of the spawned
    /// warming task, or None when no slug was provided. The fetch result
    /// is recorded on the cache entry, never exposed here.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        let slug = self.slug.clone()?;
        let client = Arc::clone(&self.client);
        let cache = Arc::clone(&self.cache);

        Some(tokio::spawn(async move {
            let key = subscription_keys::org_subscription(&slug);
            let fetcher = move || {
                let client = Arc::clone(&client);
                let slug = slug.clone();
                async move { client.get_org_subscription(&slug, None).await }
            };
            cache.prefetch(&key, fetcher).await;
        }))
    }
}

//! Configuration module
//!
//! Client configuration loaded from the environment, with sensible
//! defaults for local development.

use std::env;

// Common constants
const HTTP_TIMEOUT_SECS: u64 = 60;
const CACHE_CAPACITY: usize = 64;
const CACHE_STALE_SECS: u64 = 60;
const FETCH_RETRIES: u32 = 0;

/// Configuration for the API client and the query cache.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the billing API, without a trailing slash.
    pub base_url: String,
    /// Optional API key sent as `X-API-Key`. Anonymous when unset.
    pub api_key: Option<String>,
    pub http_timeout_secs: u64,
    /// Maximum number of cached query entries before LRU eviction.
    pub cache_capacity: usize,
    /// Default staleness window for cached entries, in seconds.
    pub cache_stale_secs: u64,
    /// Default retry count applied by the query cache. 0 disables retries.
    pub fetch_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: None,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            cache_capacity: CACHE_CAPACITY,
            cache_stale_secs: CACHE_STALE_SECS,
            fetch_retries: FETCH_RETRIES,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment: ORGBILL_API_URL (or API_URL),
    /// ORGBILL_API_KEY (or API_KEY), plus cache tuning variables.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base_url = env::var("ORGBILL_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let api_key = env::var("ORGBILL_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|s| !s.is_empty());

        let config = ClientConfig {
            base_url,
            api_key,
            http_timeout_secs: env::var("ORGBILL_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            cache_capacity: env::var("ORGBILL_CACHE_CAPACITY")
                .unwrap_or_else(|_| CACHE_CAPACITY.to_string())
                .parse()
                .unwrap_or(CACHE_CAPACITY),
            cache_stale_secs: env::var("ORGBILL_CACHE_STALE_SECS")
                .unwrap_or_else(|_| CACHE_STALE_SECS.to_string())
                .parse()
                .unwrap_or(CACHE_STALE_SECS),
            fetch_retries: env::var("ORGBILL_FETCH_RETRIES")
                .unwrap_or_else(|_| FETCH_RETRIES.to_string())
                .parse()
                .unwrap_or(FETCH_RETRIES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("ORGBILL_API_URL must not be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "ORGBILL_API_URL must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }

        if self.cache_capacity == 0 {
            return Err(anyhow::anyhow!("ORGBILL_CACHE_CAPACITY must be at least 1"));
        }

        Ok(())
    }
}

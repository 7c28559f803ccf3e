//! HTTP client for the organization billing API.
//!
//! Provides a minimal client with configurable auth (Bearer token or
//! X-API-Key), a generic cancellation-aware GET helper, and domain methods
//! (org subscription). Service and CLI crates use this client directly.

pub mod api;

use anyhow::{Context, Result};
use orgbill_core::{AppError, ClientConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
    /// No credentials attached.
    Anonymous,
}

/// HTTP client for the billing API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create a client from a loaded [`ClientConfig`]. Uses X-API-Key auth
    /// when an API key is configured, anonymous otherwise.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let auth = match &config.api_key {
            Some(key) => Auth::XApiKey(key.clone()),
            None => Auth::Anonymous,
        };
        Self::new(config.base_url.clone(), auth, config.http_timeout_secs)
    }

    /// Create a client from environment: ORGBILL_API_URL (or API_URL),
    /// ORGBILL_API_KEY (or API_KEY).
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
            Auth::Anonymous => request,
        }
    }

    /// GET request. Deserializes the JSON response body.
    ///
    /// Non-success responses become [`AppError::Request`] carrying the
    /// server's error payload verbatim (parsed as JSON when possible,
    /// otherwise wrapped as a JSON string).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        self.get_with_cancel(path, None).await
    }

    /// GET request that can be abandoned through a cancellation token.
    /// When the token fires first, the in-flight request is dropped and
    /// the call resolves to [`AppError::Cancelled`].
    pub async fn get_with_cancel<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.get(&url));

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| AppError::transport("Failed to send request", e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str(&text)
                    .unwrap_or_else(|_| serde_json::Value::String(text));
                tracing::debug!(%url, status = status.as_u16(), "request failed");
                return Err(AppError::Request {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| AppError::Decode(e.to_string()))
        };

        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(%url, "request cancelled");
                    Err(AppError::Cancelled)
                }
                result = exchange => result,
            },
            None => exchange.await,
        }
    }

    /// Raw client for custom requests. Caller must apply auth via
    /// build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

// Re-export domain response types for convenience.
pub use orgbill_core::models::{OrgSubscription, PaymentMethod, Plan, PlanId, UsageFee};

//! Retryable HTTP clients for notification delivery.
//!
//! Clients are built once per retry policy and reused; each carries a hard
//! per-request timeout so a misbehaving provider can never hang a sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, Jitter, RetryTransientMiddleware};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{HttpRetryConfig, JitterSetting};

/// Errors that can occur within the [`HttpClientPool`].
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// Building the underlying `reqwest::Client` failed.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Wraps a base client with retry middleware for the given policy.
pub fn create_retryable_http_client(
    config: &HttpRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let policy_builder = match config.jitter {
        JitterSetting::None => ExponentialBackoff::builder().jitter(Jitter::None),
        JitterSetting::Full => ExponentialBackoff::builder().jitter(Jitter::Full),
    };

    let retry_policy = policy_builder
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries);

    ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// A thread-safe pool of HTTP clients keyed by retry policy.
pub struct HttpClientPool {
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
    request_timeout: Duration,
}

impl HttpClientPool {
    /// Creates an empty pool whose clients enforce `request_timeout` on
    /// every request.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            request_timeout,
        }
    }

    /// Gets an existing client for this retry policy or creates one.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        // Fast path with a read lock.
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have created it while we waited for the lock.
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(4)
            .connect_timeout(Duration::from_secs(10))
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());

        Ok(new_client)
    }

    #[cfg(test)]
    async fn active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pool_reuses_clients_per_policy() {
        let pool = HttpClientPool::default();
        let policy = HttpRetryConfig::default();

        let a = pool.get_or_create(&policy).await.unwrap();
        let b = pool.get_or_create(&policy).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.active_client_count().await, 1);
    }

    #[tokio::test]
    async fn distinct_policies_get_distinct_clients() {
        let pool = HttpClientPool::default();
        let a = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();
        let b = pool
            .get_or_create(&HttpRetryConfig {
                max_retries: 7,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.active_client_count().await, 2);
    }
}

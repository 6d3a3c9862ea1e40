//! Shared-secret retrieval and caching.
//!
//! The webhook secret lives in an external HTTP secret store. It is fetched
//! once on first use and held for the life of the process; `clear()` drops the
//! cached value for rotation and test isolation.
//!
//! The secret value itself must never appear in logs or error output.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Failure while retrieving a secret from the external store.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret store unreachable: {0}")]
    Unreachable(String),

    #[error("secret store denied access to '{name}' (status {status})")]
    Denied { name: String, status: u16 },

    #[error("secret '{0}' has an empty value")]
    Empty(String),

    #[error("secret store returned a malformed response: {0}")]
    Malformed(String),
}

/// Retrieval of a named secret from an external store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<String, SecretError>;
}

#[derive(Deserialize)]
struct SecretValue {
    value: String,
}

/// HTTP key-value secret store client.
///
/// Expects `GET {base_url}/secrets/{name}` to return `{"value": "..."}`.
pub struct HttpSecretStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSecretStore {
    pub fn new(base_url: &str, token: Option<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .context("Failed to create secret store HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn fetch(&self, name: &str) -> Result<String, SecretError> {
        let url = format!("{}/secrets/{}", self.base_url, name);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SecretError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SecretError::Unreachable(e.to_string()))?;

        decode_secret_response(name, status, &body)
    }
}

/// Map a secret store response to a secret value or classified failure.
///
/// 401/403 means the store denied access; any other non-success status counts
/// as unreachable. A successful response must carry non-empty JSON
/// `{"value": "..."}`.
fn decode_secret_response(
    name: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<String, SecretError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SecretError::Denied {
            name: name.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(SecretError::Unreachable(format!(
            "unexpected status {status} from secret store"
        )));
    }

    let secret: SecretValue =
        serde_json::from_str(body).map_err(|e| SecretError::Malformed(e.to_string()))?;

    if secret.value.is_empty() {
        return Err(SecretError::Empty(name.to_string()));
    }

    Ok(secret.value)
}

/// Process-wide cached holder for the webhook secret.
///
/// The first `get()` fetches from the store; later calls return the cached
/// value until `clear()`. Two validations racing before the first fetch
/// completes may both hit the store; one secret read rarely makes that
/// harmless, so no fetch de-duplication is done.
pub struct SecretProvider {
    store: Arc<dyn SecretStore>,
    name: String,
    cached: RwLock<Option<String>>,
}

impl SecretProvider {
    pub fn new(store: Arc<dyn SecretStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            cached: RwLock::new(None),
        }
    }

    /// Return the secret, fetching it from the store on first use.
    pub async fn get(&self) -> Result<String, SecretError> {
        if let Some(value) = self.cached.read().await.as_ref() {
            debug!("secret_cache_hit");
            return Ok(value.clone());
        }

        info!(secret_name = %self.name, "secret_fetching");
        let value = self.store.fetch(&self.name).await?;

        *self.cached.write().await = Some(value.clone());
        info!(secret_name = %self.name, "secret_cached");

        Ok(value)
    }

    /// Drop the cached value. The next `get()` performs a fresh fetch.
    pub async fn clear(&self) {
        *self.cached.write().await = None;
        info!(secret_name = %self.name, "secret_cache_cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        result: Result<String, ()>,
    }

    impl CountingStore {
        fn returning(value: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(value.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecretStore for CountingStore {
        async fn fetch(&self, name: &str) -> Result<String, SecretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(value) => Ok(value.clone()),
                Err(()) => Err(SecretError::Unreachable(format!(
                    "connection refused fetching '{name}'"
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_get_fetches_once_then_hits_cache() {
        let store = Arc::new(CountingStore::returning("test-secret-token"));
        let provider = SecretProvider::new(store.clone(), "telegram/webhook");

        for _ in 0..5 {
            assert_eq!(provider.get().await.unwrap(), "test-secret-token");
        }

        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_fresh_fetch() {
        let store = Arc::new(CountingStore::returning("test-secret-token"));
        let provider = SecretProvider::new(store.clone(), "telegram/webhook");

        provider.get().await.unwrap();
        provider.clear().await;
        provider.get().await.unwrap();

        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_cached() {
        let store = Arc::new(CountingStore::failing());
        let provider = SecretProvider::new(store.clone(), "telegram/webhook");

        assert!(provider.get().await.is_err());
        assert!(provider.get().await.is_err());

        // Each attempt hits the store again; only successes are cached.
        assert_eq!(store.call_count(), 2);
    }

    #[test]
    fn test_decode_response_success() {
        let value = decode_secret_response(
            "telegram/webhook",
            reqwest::StatusCode::OK,
            r#"{"value":"test-secret-token"}"#,
        );
        assert_eq!(value.unwrap(), "test-secret-token");
    }

    #[test]
    fn test_decode_response_denied() {
        for status in [
            reqwest::StatusCode::UNAUTHORIZED,
            reqwest::StatusCode::FORBIDDEN,
        ] {
            let result = decode_secret_response("telegram/webhook", status, "");
            match result {
                Err(SecretError::Denied { name, status: code }) => {
                    assert_eq!(name, "telegram/webhook");
                    assert_eq!(code, status.as_u16());
                }
                other => panic!("expected Denied, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_response_unexpected_status_is_unreachable() {
        let result = decode_secret_response(
            "telegram/webhook",
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "",
        );
        assert!(matches!(result, Err(SecretError::Unreachable(_))));
    }

    #[test]
    fn test_decode_response_empty_value() {
        let result = decode_secret_response(
            "telegram/webhook",
            reqwest::StatusCode::OK,
            r#"{"value":""}"#,
        );
        assert!(matches!(result, Err(SecretError::Empty(_))));
    }

    #[test]
    fn test_decode_response_malformed_body() {
        for body in ["not json", r#"{"unexpected":"shape"}"#] {
            let result = decode_secret_response("telegram/webhook", reqwest::StatusCode::OK, body);
            assert!(matches!(result, Err(SecretError::Malformed(_))));
        }
    }
}

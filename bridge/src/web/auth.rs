//! Shared-secret validation for inbound webhook calls.
//!
//! Telegram echoes the secret configured at `setWebhook` time back in a
//! request header; a call is authentic iff that header equals the secret held
//! in the secret store. The three failure shapes map to different status
//! codes at the response boundary: a missing or wrong token is the caller's
//! fault (401), an unreachable secret store is ours (500). Conflating them
//! would either leak infra failures as "bad credentials" or invite credential
//! guessing.

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::secrets::SecretProvider;

/// Outcome of a failed credential validation. Exactly one holds per attempt.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no secret token provided in request headers")]
    NoSecretProvided,

    #[error("secret provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("secret token does not match expected value")]
    Mismatch,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NoSecretProvided | ValidationError::Mismatch => AppError::Unauthorized,
            ValidationError::ProviderUnavailable(detail) => AppError::Internal(detail),
        }
    }
}

/// Validate the secret token supplied with a webhook call.
///
/// Short-circuits in order: missing token, provider failure, mismatch.
/// The provided value is never logged.
pub async fn validate_token(
    provided: Option<&str>,
    provider: &SecretProvider,
) -> Result<(), ValidationError> {
    let provided = match provided {
        Some(token) => token,
        None => {
            warn!("webhook_token_missing");
            return Err(ValidationError::NoSecretProvided);
        }
    };

    let expected = provider.get().await.map_err(|e| {
        error!(error = %e, "secret_provider_unavailable");
        ValidationError::ProviderUnavailable(e.to_string())
    })?;

    if constant_time_compare(provided, &expected) {
        debug!("webhook_token_valid");
        Ok(())
    } else {
        warn!("webhook_token_mismatch");
        Err(ValidationError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{SecretError, SecretStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedStore(&'static str);

    #[async_trait]
    impl SecretStore for FixedStore {
        async fn fetch(&self, _name: &str) -> Result<String, SecretError> {
            Ok(self.0.to_string())
        }
    }

    struct DownStore;

    #[async_trait]
    impl SecretStore for DownStore {
        async fn fetch(&self, _name: &str) -> Result<String, SecretError> {
            Err(SecretError::Unreachable("connection refused".to_string()))
        }
    }

    fn provider(store: impl SecretStore + 'static) -> SecretProvider {
        SecretProvider::new(Arc::new(store), "telegram/webhook")
    }

    #[tokio::test]
    async fn test_missing_token() {
        let provider = provider(FixedStore("test-secret-token"));
        let result = validate_token(None, &provider).await;
        assert!(matches!(result, Err(ValidationError::NoSecretProvided)));
    }

    #[tokio::test]
    async fn test_wrong_token() {
        let provider = provider(FixedStore("test-secret-token"));
        let result = validate_token(Some("wrong-token"), &provider).await;
        assert!(matches!(result, Err(ValidationError::Mismatch)));
    }

    #[tokio::test]
    async fn test_correct_token() {
        let provider = provider(FixedStore("test-secret-token"));
        assert!(validate_token(Some("test-secret-token"), &provider)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_store_down_is_provider_failure_not_mismatch() {
        let provider = provider(DownStore);
        let result = validate_token(Some("test-secret-token"), &provider).await;
        assert!(matches!(result, Err(ValidationError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_token_short_circuits_before_provider() {
        // A dead store must not matter when no token was supplied at all.
        let provider = provider(DownStore);
        let result = validate_token(None, &provider).await;
        assert!(matches!(result, Err(ValidationError::NoSecretProvided)));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_validation_error_maps_to_app_error() {
        use axum::http::StatusCode;

        let unauthorized: AppError = ValidationError::NoSecretProvided.into();
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);

        let unauthorized: AppError = ValidationError::Mismatch.into();
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);

        let internal: AppError = ValidationError::ProviderUnavailable("down".to_string()).into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use super::AuthError;
use crate::{provider::ProviderError, store::StoreResult};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::warn;

/// Run a store call under the persistence deadline.
pub(crate) async fn persist<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, AuthError>
where
    F: Future<Output = StoreResult<T>>,
{
    match timeout(limit, call).await {
        Ok(result) => result.map_err(AuthError::persistence(operation)),
        Err(_) => {
            warn!(operation, "persistence deadline exceeded");
            Err(AuthError::UpstreamTimeout { operation })
        }
    }
}

/// Run an identity provider call under the provider deadline.
pub(crate) async fn call_provider<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
    on_error: fn(ProviderError) -> AuthError,
) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result.map_err(on_error),
        Err(_) => {
            warn!(operation, "provider deadline exceeded");
            Err(AuthError::UpstreamTimeout { operation })
        }
    }
}

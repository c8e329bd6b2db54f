//! External identity providers.
//!
//! A provider knows how to build its authorization URL, redeem an authorization code
//! (with the PKCE verifier) for a provider access token, and read the external
//! profile. The engine resolves providers by name through [`ProviderRegistry`].

use crate::auth::AuthError;
use async_trait::async_trait;
use secrecy::SecretString;
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;

#[cfg(test)]
pub(crate) mod fake;
pub mod github;

pub use github::GitHubProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} rejected the request: {reason}")]
    Rejected {
        endpoint: &'static str,
        reason: String,
    },
    #[error("failed to decode {endpoint} response: {detail}")]
    Decode {
        endpoint: &'static str,
        detail: String,
    },
    #[error("external profile is missing {0}")]
    MissingIdentity(&'static str),
}

/// Access token issued by the provider. Only used to read the profile, never stored.
#[derive(Clone)]
pub struct ProviderToken {
    pub access_token: SecretString,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub provider_user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    fn redirect_uri(&self) -> &str;

    /// URL the end user is sent to; carries `state` and the S256 `code_challenge`.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderToken, ProviderError>;

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ExternalProfile, ProviderError>;

    /// Secondary lookup used when the profile carries no public email.
    async fn fetch_verified_email(
        &self,
        access_token: &SecretString,
    ) -> Result<Option<String>, ProviderError>;
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// # Errors
    /// [`AuthError::UnsupportedProvider`] for names nobody registered.
    pub fn get(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, AuthError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnsupportedProvider(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

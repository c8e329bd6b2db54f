//! HTTP client for services that delegate authentication to sigil.

use crate::{
    api::error::ErrorBody,
    auth::{AuthResponse, ErrorKind, InitiateOAuthResponse, LogoutResponse, TokenPair, UserProfile},
    APP_USER_AGENT,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth service returned HTTP {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
}

impl ClientError {
    /// Engine error kind reported by the service, when there is one.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api { kind, .. } => ErrorKind::from_tag(kind),
            _ => None,
        }
    }
}

/// Token carried by an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: Url,
    http: Client,
}

impl AuthClient {
    /// # Errors
    /// Returns an error if `base_url` does not parse or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Self::with_client(base_url, http)
    }

    /// # Errors
    /// Returns an error if `base_url` does not parse.
    pub fn with_client(base_url: &str, http: Client) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { base_url, http })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let (kind, message) = match response.json::<ErrorBody>().await {
            Ok(body) => (body.kind, body.message),
            Err(err) => {
                debug!(error = %err, "error response without a JSON body");
                (
                    "unknown".to_string(),
                    status.canonical_reason().unwrap_or("").to_string(),
                )
            }
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            kind,
            message,
        })
    }

    /// # Errors
    /// [`ClientError`] on transport failures or an error response.
    #[instrument(skip(self))]
    pub async fn initiate_oauth(&self, provider: &str) -> Result<InitiateOAuthResponse, ClientError> {
        self.post("v1/auth/initiate", &json!({ "provider": provider }))
            .await
    }

    /// # Errors
    /// [`ClientError`] on transport failures or an error response.
    #[instrument(skip_all, fields(provider = %provider))]
    pub async fn handle_oauth_callback(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<AuthResponse, ClientError> {
        self.post(
            "v1/auth/callback",
            &json!({ "provider": provider, "code": code, "state": state }),
        )
        .await
    }

    /// # Errors
    /// [`ClientError`] on transport failures or an error response.
    #[instrument(skip_all)]
    pub async fn validate_token(&self, access_token: &str) -> Result<UserProfile, ClientError> {
        self.post("v1/auth/validate", &json!({ "access_token": access_token }))
            .await
    }

    /// # Errors
    /// [`ClientError`] on transport failures or an error response.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        self.post("v1/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// # Errors
    /// [`ClientError`] on transport failures or an error response.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<LogoutResponse, ClientError> {
        self.post("v1/auth/logout", &json!({ "access_token": access_token }))
            .await
    }
}

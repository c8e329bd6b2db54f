use crate::{provider::ProviderError, store::StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Stable, transport independent tag for every [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SessionNotFound,
    SessionExpired,
    ProviderMismatch,
    UnsupportedProvider,
    ExchangeFailed,
    ProfileFetchFailed,
    SignatureInvalid,
    TokenMalformed,
    TokenExpired,
    RefreshTokenNotFound,
    RefreshTokenRevoked,
    RefreshTokenExpired,
    UserNotFound,
    UpstreamTimeout,
    PersistenceFailure,
}

impl ErrorKind {
    pub const ALL: [Self; 15] = [
        Self::SessionNotFound,
        Self::SessionExpired,
        Self::ProviderMismatch,
        Self::UnsupportedProvider,
        Self::ExchangeFailed,
        Self::ProfileFetchFailed,
        Self::SignatureInvalid,
        Self::TokenMalformed,
        Self::TokenExpired,
        Self::RefreshTokenNotFound,
        Self::RefreshTokenRevoked,
        Self::RefreshTokenExpired,
        Self::UserNotFound,
        Self::UpstreamTimeout,
        Self::PersistenceFailure,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionNotFound => "session_not_found",
            Self::SessionExpired => "session_expired",
            Self::ProviderMismatch => "provider_mismatch",
            Self::UnsupportedProvider => "unsupported_provider",
            Self::ExchangeFailed => "exchange_failed",
            Self::ProfileFetchFailed => "profile_fetch_failed",
            Self::SignatureInvalid => "signature_invalid",
            Self::TokenMalformed => "token_malformed",
            Self::TokenExpired => "token_expired",
            Self::RefreshTokenNotFound => "refresh_token_not_found",
            Self::RefreshTokenRevoked => "refresh_token_revoked",
            Self::RefreshTokenExpired => "refresh_token_expired",
            Self::UserNotFound => "user_not_found",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::PersistenceFailure => "persistence_failure",
        }
    }

    /// Inverse of [`ErrorKind::as_str`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure the engine reports to its callers.
///
/// Messages never carry plaintext credentials, PKCE verifiers or key material.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("oauth session not found")]
    SessionNotFound,
    #[error("oauth session expired")]
    SessionExpired,
    #[error("provider mismatch: session started with {expected}, callback for {actual}")]
    ProviderMismatch { expected: String, actual: String },
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("failed to fetch external profile: {0}")]
    ProfileFetchFailed(String),
    #[error("access token signature is invalid")]
    SignatureInvalid,
    #[error("access token is malformed")]
    TokenMalformed,
    #[error("access token has expired")]
    TokenExpired,
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("refresh token has been revoked")]
    RefreshTokenRevoked,
    #[error("refresh token has expired")]
    RefreshTokenExpired,
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("{operation} timed out")]
    UpstreamTimeout { operation: &'static str },
    #[error("persistence failure during {operation}")]
    PersistenceFailure {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound => ErrorKind::SessionNotFound,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::ProviderMismatch { .. } => ErrorKind::ProviderMismatch,
            Self::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Self::ExchangeFailed(_) => ErrorKind::ExchangeFailed,
            Self::ProfileFetchFailed(_) => ErrorKind::ProfileFetchFailed,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::TokenMalformed => ErrorKind::TokenMalformed,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::RefreshTokenNotFound => ErrorKind::RefreshTokenNotFound,
            Self::RefreshTokenRevoked => ErrorKind::RefreshTokenRevoked,
            Self::RefreshTokenExpired => ErrorKind::RefreshTokenExpired,
            Self::UserNotFound(_) => ErrorKind::UserNotFound,
            Self::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            Self::PersistenceFailure { .. } => ErrorKind::PersistenceFailure,
        }
    }

    /// The engine never retries; these are the failures a caller may retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. } | Self::PersistenceFailure { .. }
        )
    }

    pub(crate) fn persistence(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::PersistenceFailure { operation, source }
    }

    pub(crate) fn exchange(err: ProviderError) -> Self {
        Self::ExchangeFailed(err.to_string())
    }

    pub(crate) fn profile(err: ProviderError) -> Self {
        Self::ProfileFetchFailed(err.to_string())
    }
}

//! Persisted records owned by the auth engine.
//!
//! Timestamps are unix seconds; every comparison against "now" goes through the
//! engine clock, never the database clock.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pending PKCE handshake, keyed by the `state` round-tripped through the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub state: String,
    pub provider: String,
    pub code_verifier: String,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub expires_at: i64,
    pub created_at: i64,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

// The verifier is the PKCE secret; keep it out of debug output.
impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &crate::auth::truncate(&self.state, 4))
            .field("provider", &self.provider)
            .field("code_verifier", &"***")
            .field("code_challenge", &self.code_challenge)
            .field("redirect_uri", &self.redirect_uri)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub identity_provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl User {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Stored refresh credential. Only the SHA-256 hex digest of the plaintext is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: i64,
    pub created_at: i64,
    pub revoked_at: Option<i64>,
    pub revoked_reason: Option<String>,
}

impl RefreshCredential {
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Successor row handed to [`super::RefreshTokenRepository::rotate`]; the owning
/// user is taken from the credential being replaced.
#[derive(Debug, Clone)]
pub struct NewRefreshCredential {
    pub id: Uuid,
    pub token_hash: String,
    pub expires_at: i64,
    pub created_at: i64,
}

impl NewRefreshCredential {
    #[must_use]
    pub fn bind_to(self, user_id: Uuid) -> RefreshCredential {
        RefreshCredential {
            id: self.id,
            user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
            revoked_at: None,
            revoked_reason: None,
        }
    }
}

/// Result of an atomic rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated {
        previous: RefreshCredential,
        successor: RefreshCredential,
    },
    NotFound,
    Revoked,
    /// The presented credential had expired; it has been revoked with reason `expired`.
    Expired,
}

/// Reasons recorded on revoked refresh credentials.
pub mod revocation_reason {
    pub const EXPIRED: &str = "expired";
    pub const TOKEN_REFRESHED: &str = "token_refreshed";
    pub const USER_LOGOUT: &str = "user_logout";
    pub const USER_NOT_FOUND: &str = "user_not_found";
}

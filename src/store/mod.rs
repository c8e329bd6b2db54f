//! Persistence interfaces for sessions, users and refresh credentials.
//!
//! The engine only talks to these traits. Two backends ship: [`memory::MemoryStore`]
//! for development and tests, and [`postgres::PgStore`] for deployments.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
pub(crate) mod flaky;
pub mod memory;
mod models;
pub mod postgres;

pub use models::{
    revocation_reason, AuthSession, NewRefreshCredential, RefreshCredential, RotationOutcome,
    User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: AuthSession) -> StoreResult<()>;

    /// Remove and return the session for `state` in one step, so a state value can
    /// be redeemed at most once even under concurrent callbacks.
    async fn take_session(&self, state: &str) -> StoreResult<Option<AuthSession>>;

    /// Idempotent; deleting a missing session is not an error.
    async fn delete_session(&self, state: &str) -> StoreResult<()>;

    async fn purge_expired_sessions(&self, now: i64) -> StoreResult<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Live (not soft-deleted) user by id.
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with [`StoreError::Conflict`] when a live user already exists for the
    /// same `(identity_provider, provider_user_id)`.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    /// Update the mutable profile fields; `None` when the user is missing or deleted.
    async fn update_user_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        avatar_url: Option<String>,
        updated_at: i64,
    ) -> StoreResult<Option<User>>;

    async fn soft_delete_user(&self, id: Uuid, at: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert_refresh_token(&self, record: RefreshCredential) -> StoreResult<()>;

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshCredential>>;

    /// Revoke a single credential. Already revoked rows keep their original reason.
    async fn revoke_refresh_token(&self, id: Uuid, reason: &str, at: i64) -> StoreResult<bool>;

    /// Revoke every live credential owned by `user_id`, returning how many changed.
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str, at: i64)
        -> StoreResult<u64>;

    /// Look up `token_hash`, check it, revoke it and insert `successor` for the same
    /// user as one serializable step.
    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: i64,
        successor: NewRefreshCredential,
    ) -> StoreResult<RotationOutcome>;
}

#[async_trait]
pub trait Store: SessionRepository + UserRepository + RefreshTokenRepository {
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}

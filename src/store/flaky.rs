//! Memory store with one-shot failure injection.

use super::{
    memory::MemoryStore, AuthSession, NewRefreshCredential, RefreshCredential,
    RefreshTokenRepository, RotationOutcome, SessionRepository, Store, StoreError, StoreResult,
    User, UserRepository,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_user_lookup: AtomicBool,
    fail_refresh_insert: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// The next `find_user_by_id` fails.
    pub(crate) fn fail_next_user_lookup(&self) {
        self.fail_user_lookup.store(true, Ordering::SeqCst);
    }

    /// The next `insert_refresh_token` fails.
    pub(crate) fn fail_next_refresh_insert(&self) {
        self.fail_refresh_insert.store(true, Ordering::SeqCst);
    }

    fn trip(flag: &AtomicBool) -> StoreResult<()> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!("connection reset")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for FlakyStore {
    async fn insert_session(&self, session: AuthSession) -> StoreResult<()> {
        self.inner.insert_session(session).await
    }

    async fn take_session(&self, state: &str) -> StoreResult<Option<AuthSession>> {
        self.inner.take_session(state).await
    }

    async fn delete_session(&self, state: &str) -> StoreResult<()> {
        self.inner.delete_session(state).await
    }

    async fn purge_expired_sessions(&self, now: i64) -> StoreResult<u64> {
        self.inner.purge_expired_sessions(now).await
    }
}

#[async_trait]
impl UserRepository for FlakyStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Self::trip(&self.fail_user_lookup)?;
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<User>> {
        self.inner
            .find_user_by_provider_identity(provider, provider_user_id)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        self.inner.create_user(user).await
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        avatar_url: Option<String>,
        updated_at: i64,
    ) -> StoreResult<Option<User>> {
        self.inner
            .update_user_profile(id, username, avatar_url, updated_at)
            .await
    }

    async fn soft_delete_user(&self, id: Uuid, at: i64) -> StoreResult<bool> {
        self.inner.soft_delete_user(id, at).await
    }
}

#[async_trait]
impl RefreshTokenRepository for FlakyStore {
    async fn insert_refresh_token(&self, record: RefreshCredential) -> StoreResult<()> {
        Self::trip(&self.fail_refresh_insert)?;
        self.inner.insert_refresh_token(record).await
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshCredential>> {
        self.inner.find_refresh_token_by_hash(token_hash).await
    }

    async fn revoke_refresh_token(&self, id: Uuid, reason: &str, at: i64) -> StoreResult<bool> {
        self.inner.revoke_refresh_token(id, reason, at).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str, at: i64) -> StoreResult<u64> {
        self.inner.revoke_all_for_user(user_id, reason, at).await
    }

    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: i64,
        successor: NewRefreshCredential,
    ) -> StoreResult<RotationOutcome> {
        self.inner
            .rotate_refresh_token(token_hash, now, successor)
            .await
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

//! In-memory store.
//!
//! Not durable: all state is lost on restart and multiple instances do not share
//! anything. Every operation runs under one `tokio::sync::Mutex`, which is what makes
//! `take_session` and `rotate_refresh_token` atomic here.

use super::{
    AuthSession, NewRefreshCredential, RefreshCredential, RefreshTokenRepository,
    RotationOutcome, SessionRepository, Store, StoreError, StoreResult, User, UserRepository,
};
use crate::store::revocation_reason;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, AuthSession>,
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshCredential>,
    // token_hash -> credential id
    refresh_index: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending sessions, mostly useful in tests.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// All credentials owned by `user_id`, oldest first.
    pub async fn refresh_tokens_for_user(&self, user_id: Uuid) -> Vec<RefreshCredential> {
        let inner = self.inner.lock().await;
        let mut records: Vec<RefreshCredential> = inner
            .refresh_tokens
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        records
    }
}

fn revoke(record: &mut RefreshCredential, reason: &str, at: i64) -> bool {
    if record.revoked_at.is_some() {
        return false;
    }
    record.revoked_at = Some(at);
    record.revoked_reason = Some(reason.to_string());
    true
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: AuthSession) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(&session.state) {
            return Err(StoreError::Conflict("session state already exists".into()));
        }
        inner.sessions.insert(session.state.clone(), session);
        Ok(())
    }

    async fn take_session(&self, state: &str) -> StoreResult<Option<AuthSession>> {
        Ok(self.inner.lock().await.sessions.remove(state))
    }

    async fn delete_session(&self, state: &str) -> StoreResult<()> {
        self.inner.lock().await.sessions.remove(state);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: i64) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&id).filter(|user| user.is_live()).cloned())
    }

    async fn find_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|user| {
                user.is_live()
                    && user.identity_provider == provider
                    && user.provider_user_id == provider_user_id
            })
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.is_live() && user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner.users.values().any(|existing| {
            existing.is_live()
                && existing.identity_provider == user.identity_provider
                && existing.provider_user_id == user.provider_user_id
        });
        if duplicate || inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "user already exists for provider {}",
                user.identity_provider
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        avatar_url: Option<String>,
        updated_at: i64,
    ) -> StoreResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&id).filter(|user| user.is_live()) else {
            return Ok(None);
        };
        user.username = username;
        user.avatar_url = avatar_url;
        user.updated_at = updated_at;
        Ok(Some(user.clone()))
    }

    async fn soft_delete_user(&self, id: Uuid, at: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&id).filter(|user| user.is_live()) {
            Some(user) => {
                user.deleted_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn insert_refresh_token(&self, record: RefreshCredential) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.refresh_index.contains_key(&record.token_hash) {
            return Err(StoreError::Conflict("refresh token hash already exists".into()));
        }
        inner
            .refresh_index
            .insert(record.token_hash.clone(), record.id);
        inner.refresh_tokens.insert(record.id, record);
        Ok(())
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshCredential>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .refresh_index
            .get(token_hash)
            .and_then(|id| inner.refresh_tokens.get(id))
            .cloned())
    }

    async fn revoke_refresh_token(&self, id: Uuid, reason: &str, at: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .refresh_tokens
            .get_mut(&id)
            .is_some_and(|record| revoke(record, reason, at)))
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
        at: i64,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut revoked = 0;
        for record in inner.refresh_tokens.values_mut() {
            if record.user_id == user_id && revoke(record, reason, at) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: i64,
        successor: NewRefreshCredential,
    ) -> StoreResult<RotationOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.refresh_index.contains_key(&successor.token_hash) {
            return Err(StoreError::Conflict("refresh token hash already exists".into()));
        }
        let Some(id) = inner.refresh_index.get(token_hash).copied() else {
            return Ok(RotationOutcome::NotFound);
        };
        let Some(current) = inner.refresh_tokens.get_mut(&id) else {
            return Ok(RotationOutcome::NotFound);
        };
        if current.is_revoked() {
            return Ok(RotationOutcome::Revoked);
        }
        if current.is_expired(now) {
            revoke(current, revocation_reason::EXPIRED, now);
            return Ok(RotationOutcome::Expired);
        }

        revoke(current, revocation_reason::TOKEN_REFRESHED, now);
        let previous = current.clone();
        let successor = successor.bind_to(previous.user_id);
        inner
            .refresh_index
            .insert(successor.token_hash.clone(), successor.id);
        inner.refresh_tokens.insert(successor.id, successor.clone());

        Ok(RotationOutcome::Rotated {
            previous,
            successor,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn user(provider_user_id: &str) -> User {
        User {
            id: Uuid::new_v4(),
            identity_provider: "github".to_string(),
            provider_user_id: provider_user_id.to_string(),
            email: "octo@example.com".to_string(),
            username: Some("octo".to_string()),
            avatar_url: None,
            created_at: 100,
            updated_at: 100,
            deleted_at: None,
        }
    }

    fn credential(user_id: Uuid, hash: &str, expires_at: i64) -> RefreshCredential {
        RefreshCredential {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash.to_string(),
            expires_at,
            created_at: 100,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    fn successor(hash: &str) -> NewRefreshCredential {
        NewRefreshCredential {
            id: Uuid::new_v4(),
            token_hash: hash.to_string(),
            expires_at: 10_000,
            created_at: 200,
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_identity() -> Result<()> {
        let store = MemoryStore::new();
        store.create_user(user("42")).await?;
        let result = store.create_user(user("42")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn soft_deleted_users_are_hidden_and_free_their_identity() -> Result<()> {
        let store = MemoryStore::new();
        let created = store.create_user(user("42")).await?;
        assert!(store.soft_delete_user(created.id, 150).await?);
        assert!(store.find_user_by_id(created.id).await?.is_none());
        assert!(store
            .find_user_by_provider_identity("github", "42")
            .await?
            .is_none());
        assert!(store
            .update_user_profile(created.id, None, None, 160)
            .await?
            .is_none());
        store.create_user(user("42")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn find_user_by_email_ignores_case() -> Result<()> {
        let store = MemoryStore::new();
        let created = store.create_user(user("7")).await?;
        let found = store.find_user_by_email("OCTO@example.com").await?;
        assert_eq!(found.map(|u| u.id), Some(created.id));
        Ok(())
    }

    #[tokio::test]
    async fn take_session_removes_it() -> Result<()> {
        let store = MemoryStore::new();
        store
            .insert_session(AuthSession {
                state: "s1".to_string(),
                provider: "github".to_string(),
                code_verifier: "v".to_string(),
                code_challenge: "c".to_string(),
                redirect_uri: "https://sigil.dev/cb".to_string(),
                expires_at: 700,
                created_at: 100,
            })
            .await?;
        assert!(store.take_session("s1").await?.is_some());
        assert!(store.take_session("s1").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn purge_only_drops_expired_sessions() -> Result<()> {
        let store = MemoryStore::new();
        for (state, expires_at) in [("old", 50), ("fresh", 500)] {
            store
                .insert_session(AuthSession {
                    state: state.to_string(),
                    provider: "github".to_string(),
                    code_verifier: "v".to_string(),
                    code_challenge: "c".to_string(),
                    redirect_uri: String::new(),
                    expires_at,
                    created_at: 0,
                })
                .await?;
        }
        assert_eq!(store.purge_expired_sessions(100).await?, 1);
        assert_eq!(store.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn rotate_revokes_previous_and_binds_successor() -> Result<()> {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store
            .insert_refresh_token(credential(owner, "old", 1_000))
            .await?;

        let outcome = store
            .rotate_refresh_token("old", 200, successor("new"))
            .await?;
        let RotationOutcome::Rotated {
            previous,
            successor,
        } = outcome
        else {
            anyhow::bail!("expected rotation, got {outcome:?}");
        };
        assert_eq!(previous.revoked_reason.as_deref(), Some("token_refreshed"));
        assert_eq!(successor.user_id, owner);

        let replay = store
            .rotate_refresh_token("old", 201, self::successor("newer"))
            .await?;
        assert_eq!(replay, RotationOutcome::Revoked);
        Ok(())
    }

    #[tokio::test]
    async fn rotate_marks_expired_credentials() -> Result<()> {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.insert_refresh_token(credential(owner, "old", 150)).await?;

        let outcome = store
            .rotate_refresh_token("old", 151, successor("new"))
            .await?;
        assert_eq!(outcome, RotationOutcome::Expired);

        let stored = store.find_refresh_token_by_hash("old").await?;
        assert_eq!(
            stored.and_then(|r| r.revoked_reason),
            Some("expired".to_string())
        );
        assert!(store.find_refresh_token_by_hash("new").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn revoke_all_is_idempotent_and_keeps_first_reason() -> Result<()> {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.insert_refresh_token(credential(owner, "a", 1_000)).await?;
        store.insert_refresh_token(credential(owner, "b", 1_000)).await?;
        store
            .insert_refresh_token(credential(Uuid::new_v4(), "other", 1_000))
            .await?;

        assert_eq!(store.revoke_all_for_user(owner, "user_logout", 300).await?, 2);
        assert_eq!(store.revoke_all_for_user(owner, "again", 400).await?, 0);

        for record in store.refresh_tokens_for_user(owner).await {
            assert_eq!(record.revoked_at, Some(300));
            assert_eq!(record.revoked_reason.as_deref(), Some("user_logout"));
        }
        let other = store.find_refresh_token_by_hash("other").await?;
        assert!(other.is_some_and(|r| !r.is_revoked()));
        Ok(())
    }
}

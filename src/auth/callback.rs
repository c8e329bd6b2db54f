//! Provider callback handling: from `(provider, code, state)` to a token pair.
//!
//! Steps run in order: spend the session, check the provider, exchange the code, read
//! the profile, create or update the user, then mint the access and refresh tokens.
//! Failures before the user step leave the user untouched. The user write is not rolled
//! back when minting fails afterwards: a returning user keeps the refreshed profile
//! fields and simply has to log in again.

use super::{
    access::AccessTokens,
    clock::Clock,
    deadline::{call_provider, persist},
    refresh::RefreshLedger,
    session::SessionStore,
    truncate,
    types::{AuthResponse, UserProfile},
    AuthError,
};
use crate::{
    provider::{IdentityProvider, ProviderRegistry},
    store::{AuthSession, Store, StoreError, User},
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// External identity with the email resolved.
#[derive(Debug, Clone)]
struct Identity {
    provider_user_id: String,
    email: String,
    username: Option<String>,
    avatar_url: Option<String>,
}

pub struct CallbackOrchestrator<S: ?Sized> {
    sessions: Arc<SessionStore<S>>,
    users: Arc<S>,
    providers: ProviderRegistry,
    access: Arc<AccessTokens>,
    refresh: Arc<RefreshLedger<S>>,
    clock: Arc<dyn Clock>,
    persistence_timeout: Duration,
    provider_timeout: Duration,
}

impl<S: Store + ?Sized> CallbackOrchestrator<S> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        sessions: Arc<SessionStore<S>>,
        users: Arc<S>,
        providers: ProviderRegistry,
        access: Arc<AccessTokens>,
        refresh: Arc<RefreshLedger<S>>,
        clock: Arc<dyn Clock>,
        persistence_timeout: Duration,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            providers,
            access,
            refresh,
            clock,
            persistence_timeout,
            provider_timeout,
        }
    }

    /// Complete a login. The session for `state` is spent whatever the outcome.
    ///
    /// # Errors
    /// Any session, provider, persistence or deadline error; see [`AuthError`].
    #[instrument(skip_all, fields(provider = %provider, state = %truncate(state, 4)))]
    pub async fn handle_callback(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<AuthResponse, AuthError> {
        let session = self.sessions.consume_session(state).await?;
        let result = self.complete(&session, provider, code).await;
        self.sessions.discard(state).await;

        match &result {
            Ok(response) => info!(
                user_id = %truncate(&response.user.id.to_string(), 8),
                "login completed"
            ),
            Err(err) => warn!(kind = %err.kind(), error = %err, "login aborted"),
        }
        result
    }

    async fn complete(
        &self,
        session: &AuthSession,
        provider_name: &str,
        code: &str,
    ) -> Result<AuthResponse, AuthError> {
        if session.provider != provider_name {
            return Err(AuthError::ProviderMismatch {
                expected: session.provider.clone(),
                actual: provider_name.to_string(),
            });
        }
        let provider = self.providers.get(provider_name)?;

        let token = call_provider(
            self.provider_timeout,
            "exchange_code",
            provider.exchange_code(code, &session.code_verifier),
            AuthError::exchange,
        )
        .await?;

        let identity = self.fetch_identity(provider.as_ref(), &token.access_token).await?;
        let user = self.resolve_user(provider_name, identity).await?;

        let access_token = self
            .access
            .issue(user.id, &user.email, &user.identity_provider)?;
        let refresh = self.refresh.issue(user.id).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token: refresh.plaintext,
            user: UserProfile::from(&user),
        })
    }

    async fn fetch_identity(
        &self,
        provider: &dyn IdentityProvider,
        access_token: &SecretString,
    ) -> Result<Identity, AuthError> {
        let profile = call_provider(
            self.provider_timeout,
            "fetch_profile",
            provider.fetch_profile(access_token),
            AuthError::profile,
        )
        .await?;

        let email = match profile.email.filter(|email| !email.is_empty()) {
            Some(email) => email,
            None => {
                debug!("profile has no public email, asking for verified addresses");
                call_provider(
                    self.provider_timeout,
                    "fetch_verified_email",
                    provider.fetch_verified_email(access_token),
                    AuthError::profile,
                )
                .await?
                .ok_or_else(|| {
                    AuthError::ProfileFetchFailed("no email address on the account".into())
                })?
            }
        };

        Ok(Identity {
            provider_user_id: profile.provider_user_id,
            email,
            username: profile.username,
            avatar_url: profile.avatar_url,
        })
    }

    /// Find the user for this external identity, refreshing its profile, or create it.
    async fn resolve_user(&self, provider: &str, identity: Identity) -> Result<User, AuthError> {
        let existing = persist(
            self.persistence_timeout,
            "find_user_by_provider_identity",
            self.users
                .find_user_by_provider_identity(provider, &identity.provider_user_id),
        )
        .await?;

        if let Some(user) = existing {
            return self.update_profile(user.id, &identity).await;
        }

        let now = self.clock.now();
        let candidate = User {
            id: Uuid::new_v4(),
            identity_provider: provider.to_string(),
            provider_user_id: identity.provider_user_id.clone(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            avatar_url: identity.avatar_url.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        match persist(
            self.persistence_timeout,
            "create_user",
            self.users.create_user(candidate),
        )
        .await
        {
            Ok(user) => {
                info!(user_id = %truncate(&user.id.to_string(), 8), "user created");
                Ok(user)
            }
            // A concurrent login created the same identity first.
            Err(AuthError::PersistenceFailure {
                source: StoreError::Conflict(_),
                ..
            }) => {
                let winner = persist(
                    self.persistence_timeout,
                    "find_user_by_provider_identity",
                    self.users
                        .find_user_by_provider_identity(provider, &identity.provider_user_id),
                )
                .await?
                .ok_or_else(|| AuthError::PersistenceFailure {
                    operation: "create_user",
                    source: StoreError::Conflict("identity vanished after conflict".into()),
                })?;
                self.update_profile(winner.id, &identity).await
            }
            Err(err) => Err(err),
        }
    }

    async fn update_profile(&self, user_id: Uuid, identity: &Identity) -> Result<User, AuthError> {
        persist(
            self.persistence_timeout,
            "update_user_profile",
            self.users.update_user_profile(
                user_id,
                identity.username.clone(),
                identity.avatar_url.clone(),
                self.clock.now(),
            ),
        )
        .await?
        .ok_or(AuthError::UserNotFound(user_id))
    }
}

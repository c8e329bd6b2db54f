//! The RPC surface: `InitiateOAuth`, `HandleOAuthCallback`, `ValidateToken`,
//! `RefreshToken` and `Logout`.

use super::{
    access::{AccessTokens, Hs256Codec, TokenCodec},
    callback::CallbackOrchestrator,
    clock::Clock,
    config::AuthConfig,
    deadline::persist,
    refresh::RefreshLedger,
    revocation::RevocationService,
    session::SessionStore,
    truncate,
    types::{AuthResponse, InitiateOAuthResponse, LogoutResponse, TokenPair, UserProfile},
    AuthError,
};
use crate::{
    provider::ProviderRegistry,
    store::{revocation_reason, Store},
};
use std::{sync::Arc, time::Duration};
use tracing::{instrument, warn};

pub struct AuthService<S: ?Sized = dyn Store> {
    store: Arc<S>,
    providers: ProviderRegistry,
    sessions: Arc<SessionStore<S>>,
    access: Arc<AccessTokens>,
    refresh: Arc<RefreshLedger<S>>,
    callbacks: CallbackOrchestrator<S>,
    revocation: RevocationService<S>,
    persistence_timeout: Duration,
}

impl<S: Store + ?Sized> AuthService<S> {
    /// Wire the engine with the HS256 codec keyed from `config`.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        providers: ProviderRegistry,
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let codec = Arc::new(Hs256Codec::new(config.signing_key()));
        Self::with_codec(store, providers, config, clock, codec)
    }

    #[must_use]
    pub fn with_codec(
        store: Arc<S>,
        providers: ProviderRegistry,
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
        codec: Arc<dyn TokenCodec>,
    ) -> Self {
        let persistence_timeout = config.persistence_timeout();

        let sessions = Arc::new(SessionStore::new(
            store.clone(),
            clock.clone(),
            config.session_ttl_seconds(),
            persistence_timeout,
        ));
        let access = Arc::new(AccessTokens::new(
            codec,
            clock.clone(),
            config.access_token_ttl_seconds(),
        ));
        let refresh = Arc::new(RefreshLedger::new(
            store.clone(),
            clock.clone(),
            config.refresh_token_ttl_seconds(),
            persistence_timeout,
        ));
        let callbacks = CallbackOrchestrator::new(
            sessions.clone(),
            store.clone(),
            providers.clone(),
            access.clone(),
            refresh.clone(),
            clock,
            persistence_timeout,
            config.provider_timeout(),
        );
        let revocation = RevocationService::new(
            access.clone(),
            refresh.clone(),
            store.clone(),
            persistence_timeout,
        );

        Self {
            store,
            providers,
            sessions,
            access,
            refresh,
            callbacks,
            revocation,
            persistence_timeout,
        }
    }

    /// Start a login with `provider`.
    ///
    /// # Errors
    /// `UnsupportedProvider`, or a persistence error while storing the session.
    #[instrument(skip(self))]
    pub async fn initiate_oauth(&self, provider: &str) -> Result<InitiateOAuthResponse, AuthError> {
        let provider = self.providers.get(provider)?;
        let pending = self.sessions.create_session(provider.as_ref()).await?;
        Ok(InitiateOAuthResponse {
            redirect_url: pending.redirect_url,
        })
    }

    /// # Errors
    /// See [`CallbackOrchestrator::handle_callback`].
    pub async fn handle_oauth_callback(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<AuthResponse, AuthError> {
        self.callbacks.handle_callback(provider, code, state).await
    }

    /// # Errors
    /// Access token errors, or `UserNotFound` when the owner is gone.
    pub async fn validate_token(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        self.revocation.validate_token(access_token).await
    }

    /// Rotate `refresh_token` and mint a fresh access token for its owner.
    ///
    /// The owner is loaded before the rotation commits, so a failed lookup leaves the
    /// presented token usable for a retry.
    ///
    /// # Errors
    /// Refresh token errors, `UserNotFound` when the owner was deleted, or a
    /// persistence error.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let current = self.refresh.resolve(refresh_token).await?;

        let user = persist(
            self.persistence_timeout,
            "find_user_by_id",
            self.store.find_user_by_id(current.user_id),
        )
        .await?;

        let Some(user) = user else {
            // A deleted account keeps no live credential.
            if let Err(err) = self
                .refresh
                .revoke(current.id, revocation_reason::USER_NOT_FOUND)
                .await
            {
                warn!(
                    user_id = %truncate(&current.user_id.to_string(), 8),
                    error = %err,
                    "failed to revoke refresh token of missing user"
                );
            }
            return Err(AuthError::UserNotFound(current.user_id));
        };

        let access_token = self
            .access
            .issue(user.id, &user.email, &user.identity_provider)?;
        let issued = self.refresh.rotate(refresh_token).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: issued.plaintext,
        })
    }

    /// # Errors
    /// Access token errors, or a persistence error.
    pub async fn logout(&self, access_token: &str) -> Result<LogoutResponse, AuthError> {
        self.revocation.logout(access_token).await?;
        Ok(LogoutResponse { success: true })
    }

    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout` when the store is not reachable.
    pub async fn health_check(&self) -> Result<(), AuthError> {
        persist(
            self.persistence_timeout,
            "health_check",
            self.store.health_check(),
        )
        .await
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Shared session store, for [`super::session::spawn_sweeper`].
    #[must_use]
    pub fn sessions(&self) -> Arc<SessionStore<S>> {
        self.sessions.clone()
    }
}

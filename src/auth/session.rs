use super::{
    clock::Clock,
    deadline::persist,
    pkce::{code_challenge, generate_code_verifier, generate_state},
    truncate, AuthError,
};
use crate::{
    provider::IdentityProvider,
    store::{AuthSession, SessionRepository},
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Handshake handed back to the caller after [`SessionStore::create_session`].
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub state: String,
    pub redirect_url: String,
}

/// Pending PKCE handshakes. A session is redeemable exactly once.
pub struct SessionStore<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
    timeout: Duration,
}

impl<R: SessionRepository + ?Sized> SessionStore<R> {
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, ttl_seconds: i64, timeout: Duration) -> Self {
        Self {
            repo,
            clock,
            ttl_seconds,
            timeout,
        }
    }

    /// Persist a new handshake for `provider` and return the URL to send the user to.
    ///
    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout` if the session cannot be stored.
    #[instrument(skip_all, fields(provider = provider.name()))]
    pub async fn create_session(
        &self,
        provider: &dyn IdentityProvider,
    ) -> Result<PendingLogin, AuthError> {
        let code_verifier = generate_code_verifier();
        let code_challenge = code_challenge(&code_verifier);
        let state = generate_state();
        let now = self.clock.now();

        let redirect_url = provider.authorization_url(&state, &code_challenge);
        let session = AuthSession {
            state: state.clone(),
            provider: provider.name().to_string(),
            code_verifier,
            code_challenge,
            redirect_uri: provider.redirect_uri().to_string(),
            expires_at: now.saturating_add(self.ttl_seconds),
            created_at: now,
        };

        persist(
            self.timeout,
            "insert_session",
            self.repo.insert_session(session),
        )
        .await?;

        debug!(state = %truncate(&state, 4), "oauth session created");

        Ok(PendingLogin {
            state,
            redirect_url,
        })
    }

    /// Redeem the session for `state`. The stored row is gone after this call
    /// whatever the outcome.
    ///
    /// # Errors
    /// `SessionNotFound` when no session exists (or it was already redeemed),
    /// `SessionExpired` when it outlived its window.
    #[instrument(skip_all, fields(state = %truncate(state, 4)))]
    pub async fn consume_session(&self, state: &str) -> Result<AuthSession, AuthError> {
        let session = persist(self.timeout, "take_session", self.repo.take_session(state))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired(self.clock.now()) {
            info!("oauth session expired");
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }

    /// Best-effort delete; failures are logged and swallowed.
    pub async fn discard(&self, state: &str) {
        if let Err(err) = persist(self.timeout, "delete_session", self.repo.delete_session(state)).await
        {
            warn!(state = %truncate(state, 4), error = %err, "failed to delete oauth session");
        }
    }

    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout` from the store.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        persist(
            self.timeout,
            "purge_expired_sessions",
            self.repo.purge_expired_sessions(self.clock.now()),
        )
        .await
    }
}

/// Periodically delete sessions nobody came back for.
pub fn spawn_sweeper<R>(sessions: Arc<SessionStore<R>>, every: Duration) -> JoinHandle<()>
where
    R: SessionRepository + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "purged expired oauth sessions"),
                Err(err) => warn!(error = %err, "failed to purge expired oauth sessions"),
            }
        }
    })
}

//! Logout and access token validation.
//!
//! Logout revokes refresh credentials only. An access token issued before logout
//! keeps validating until its `exp`.

use super::{
    access::{AccessClaims, AccessTokens},
    deadline::persist,
    refresh::RefreshLedger,
    truncate,
    types::UserProfile,
    AuthError,
};
use crate::store::{revocation_reason, Store};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

pub struct RevocationService<S: ?Sized> {
    access: Arc<AccessTokens>,
    refresh: Arc<RefreshLedger<S>>,
    users: Arc<S>,
    timeout: Duration,
}

impl<S: Store + ?Sized> RevocationService<S> {
    #[must_use]
    pub fn new(
        access: Arc<AccessTokens>,
        refresh: Arc<RefreshLedger<S>>,
        users: Arc<S>,
        timeout: Duration,
    ) -> Self {
        Self {
            access,
            refresh,
            users,
            timeout,
        }
    }

    /// Revoke every refresh credential of the token owner. Returns how many were live.
    ///
    /// # Errors
    /// Access token errors from [`AccessTokens::verify`], or a persistence error.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<u64, AuthError> {
        let claims = self.access.verify(access_token)?;
        let revoked = self
            .refresh
            .revoke_all(claims.user_id, revocation_reason::USER_LOGOUT)
            .await?;
        info!(
            user_id = %truncate(&claims.user_id.to_string(), 8),
            revoked,
            "user logged out"
        );
        Ok(revoked)
    }

    /// Verify `access_token` and return the owner's current profile.
    ///
    /// # Errors
    /// Access token errors, `UserNotFound` when the owner is gone, or a persistence error.
    pub async fn validate_token(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let claims = self.access.verify(access_token)?;
        self.load_profile(&claims).await
    }

    async fn load_profile(&self, claims: &AccessClaims) -> Result<UserProfile, AuthError> {
        persist(
            self.timeout,
            "find_user_by_id",
            self.users.find_user_by_id(claims.user_id),
        )
        .await?
        .map(|user| UserProfile::from(&user))
        .ok_or(AuthError::UserNotFound(claims.user_id))
    }
}

//! Refresh credential ledger.
//!
//! Plaintext refresh tokens are 32 random bytes, hex encoded, handed to the caller
//! once. Only `SHA256Hex(plaintext)` is stored. Rotation is delegated to the store
//! as one atomic step, so a replayed token can win at most once.

use super::{clock::Clock, deadline::persist, truncate, AuthError};
use crate::store::{
    revocation_reason, NewRefreshCredential, RefreshCredential, RefreshTokenRepository,
    RotationOutcome,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Hex encoded SHA-256 of the plaintext token.
#[must_use]
pub fn hash_refresh_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A freshly minted credential: the plaintext for the caller, the record as stored.
pub struct IssuedRefreshToken {
    pub plaintext: String,
    pub record: RefreshCredential,
}

impl fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("plaintext", &"***")
            .field("record", &self.record)
            .finish()
    }
}

pub struct RefreshLedger<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
    timeout: Duration,
}

impl<R: RefreshTokenRepository + ?Sized> RefreshLedger<R> {
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, ttl_seconds: i64, timeout: Duration) -> Self {
        Self {
            repo,
            clock,
            ttl_seconds,
            timeout,
        }
    }

    fn mint(&self) -> (String, NewRefreshCredential) {
        let now = self.clock.now();
        let plaintext = generate_refresh_token();
        let record = NewRefreshCredential {
            id: Uuid::new_v4(),
            token_hash: hash_refresh_token(&plaintext),
            expires_at: now.saturating_add(self.ttl_seconds),
            created_at: now,
        };
        (plaintext, record)
    }

    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout` if the record cannot be stored.
    #[instrument(skip_all, fields(user_id = %truncate(&user_id.to_string(), 8)))]
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefreshToken, AuthError> {
        let (plaintext, record) = self.mint();
        let record = record.bind_to(user_id);

        persist(
            self.timeout,
            "insert_refresh_token",
            self.repo.insert_refresh_token(record.clone()),
        )
        .await?;

        Ok(IssuedRefreshToken { plaintext, record })
    }

    /// Exchange `plaintext` for a successor bound to the same user.
    ///
    /// # Errors
    /// `RefreshTokenNotFound`, `RefreshTokenRevoked`, `RefreshTokenExpired` (the
    /// presented credential is revoked with reason `expired`), or a persistence error.
    #[instrument(skip_all)]
    pub async fn rotate(&self, plaintext: &str) -> Result<IssuedRefreshToken, AuthError> {
        let token_hash = hash_refresh_token(plaintext);
        let (successor_plaintext, successor) = self.mint();

        let outcome = persist(
            self.timeout,
            "rotate_refresh_token",
            self.repo
                .rotate_refresh_token(&token_hash, self.clock.now(), successor),
        )
        .await?;

        match outcome {
            RotationOutcome::Rotated {
                previous,
                successor,
            } => {
                info!(
                    previous = %truncate(&previous.id.to_string(), 8),
                    successor = %truncate(&successor.id.to_string(), 8),
                    "refresh token rotated"
                );
                Ok(IssuedRefreshToken {
                    plaintext: successor_plaintext,
                    record: successor,
                })
            }
            RotationOutcome::NotFound => Err(AuthError::RefreshTokenNotFound),
            RotationOutcome::Revoked => {
                warn!(
                    token_hash = %truncate(&token_hash, 4),
                    "revoked refresh token presented"
                );
                Err(AuthError::RefreshTokenRevoked)
            }
            RotationOutcome::Expired => Err(AuthError::RefreshTokenExpired),
        }
    }

    /// Look up the live credential for `plaintext` without spending it.
    ///
    /// # Errors
    /// `RefreshTokenNotFound`, `RefreshTokenRevoked`, `RefreshTokenExpired` (the
    /// credential is revoked with reason `expired`), or a persistence error.
    #[instrument(skip_all)]
    pub async fn resolve(&self, plaintext: &str) -> Result<RefreshCredential, AuthError> {
        let token_hash = hash_refresh_token(plaintext);
        let record = persist(
            self.timeout,
            "find_refresh_token_by_hash",
            self.repo.find_refresh_token_by_hash(&token_hash),
        )
        .await?
        .ok_or(AuthError::RefreshTokenNotFound)?;

        if record.is_revoked() {
            warn!(
                token_hash = %truncate(&token_hash, 4),
                "revoked refresh token presented"
            );
            return Err(AuthError::RefreshTokenRevoked);
        }
        if record.is_expired(self.clock.now()) {
            self.revoke(record.id, revocation_reason::EXPIRED).await?;
            return Err(AuthError::RefreshTokenExpired);
        }
        Ok(record)
    }

    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout`.
    pub async fn revoke(&self, id: Uuid, reason: &str) -> Result<bool, AuthError> {
        persist(
            self.timeout,
            "revoke_refresh_token",
            self.repo.revoke_refresh_token(id, reason, self.clock.now()),
        )
        .await
    }

    /// Revoke every live credential of `user_id`. Idempotent.
    ///
    /// # Errors
    /// `PersistenceFailure` or `UpstreamTimeout`.
    #[instrument(skip_all, fields(user_id = %truncate(&user_id.to_string(), 8), reason = %reason))]
    pub async fn revoke_all(&self, user_id: Uuid, reason: &str) -> Result<u64, AuthError> {
        let revoked = persist(
            self.timeout,
            "revoke_all_for_user",
            self.repo
                .revoke_all_for_user(user_id, reason, self.clock.now()),
        )
        .await?;
        info!(revoked, "refresh tokens revoked");
        Ok(revoked)
    }
}

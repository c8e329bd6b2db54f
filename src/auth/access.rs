//! Stateless access tokens (compact JWS, HS256).
//!
//! Verification never touches persistence: a token stays valid until `exp` even after
//! the owner logs out. Callers that need stronger logout semantics must add their own
//! revocation check on top of [`AccessTokens::verify`].

use super::{clock::Clock, AuthError};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub email: String,
    pub provider: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Pluggable signer/verifier for access claims.
///
/// `verify` only checks algorithm, signature and structure; expiry is judged by
/// [`AccessTokens`] against the engine clock.
pub trait TokenCodec: Send + Sync {
    /// # Errors
    /// `TokenMalformed` if the claims cannot be encoded.
    fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError>;

    /// # Errors
    /// `SignatureInvalid` or `TokenMalformed`.
    fn verify(&self, token: &str) -> Result<AccessClaims, AuthError>;
}

/// HMAC-SHA256 with a key shared by every verifying service.
pub struct Hs256Codec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256Codec {
    #[must_use]
    pub fn new(key: &SecretString) -> Self {
        let secret = key.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        JwtErrorKind::InvalidSignature
        | JwtErrorKind::InvalidAlgorithm
        | JwtErrorKind::InvalidAlgorithmName
        | JwtErrorKind::MissingAlgorithm
        | JwtErrorKind::InvalidKeyFormat => AuthError::SignatureInvalid,
        _ => AuthError::TokenMalformed,
    }
}

impl TokenCodec for Hs256Codec {
    fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|err| {
            debug!(error = %err, "failed to encode access token");
            AuthError::TokenMalformed
        })
    }

    fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "access token rejected");
                classify(&err)
            })
    }
}

/// Issues and verifies access tokens with a fixed lifetime.
pub struct AccessTokens {
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
}

impl AccessTokens {
    #[must_use]
    pub fn new(codec: Arc<dyn TokenCodec>, clock: Arc<dyn Clock>, ttl_seconds: i64) -> Self {
        Self {
            codec,
            clock,
            ttl_seconds,
        }
    }

    /// # Errors
    /// `TokenMalformed` if the codec cannot encode the claims.
    pub fn issue(&self, user_id: Uuid, email: &str, provider: &str) -> Result<String, AuthError> {
        let now = self.clock.now();
        let claims = AccessClaims {
            user_id,
            email: email.to_string(),
            provider: provider.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(self.ttl_seconds),
        };
        self.codec.sign(&claims)
    }

    /// # Errors
    /// `SignatureInvalid`, `TokenMalformed`, or `TokenExpired` once `now > exp`.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims = self.codec.verify(token)?;
        if self.clock.now() > claims.expires_at {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

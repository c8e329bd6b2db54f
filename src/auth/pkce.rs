//! PKCE (RFC 7636, S256) and `state` generation.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub const CODE_CHALLENGE_METHOD: &str = "S256";

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 32;

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// 32 random bytes, base64url without padding (43 characters).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token(VERIFIER_BYTES)
}

/// `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes()))
}

/// 256 bits of entropy; the `state` doubles as the session primary key.
#[must_use]
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

//! Session and token lifecycle engine.
//!
//! Leaves first: [`session::SessionStore`] keeps pending PKCE handshakes,
//! [`access::AccessTokens`] signs and verifies stateless access tokens and
//! [`refresh::RefreshLedger`] owns the rotating refresh credentials.
//! [`callback::CallbackOrchestrator`] drives a login from provider callback to token
//! pair, [`revocation::RevocationService`] handles logout and token validation, and
//! [`service::AuthService`] exposes all of it as the RPC surface.

pub mod access;
pub mod callback;
pub mod clock;
pub mod config;
mod deadline;
pub mod error;
pub mod pkce;
pub mod refresh;
pub mod revocation;
pub mod service;
pub mod session;
mod types;

pub use access::{AccessClaims, AccessTokens, Hs256Codec, TokenCodec};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, GitHubConfig};
pub use error::{AuthError, ErrorKind};
pub use service::AuthService;
pub use types::{AuthResponse, InitiateOAuthResponse, LogoutResponse, TokenPair, UserProfile};

/// First `n` characters of `value`, followed by `...` when anything was cut.
///
/// Identifiers that reach the logs go through here.
#[must_use]
pub fn truncate(value: &str, n: usize) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(n).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        value.to_string()
    }
}

//! # Sigil (OAuth session and token lifecycle)
//!
//! `sigil` signs users in through an external identity provider with the PKCE
//! authorization code flow and keeps their credentials alive afterwards.
//!
//! ## Credentials
//!
//! - **OAuth sessions** bind a random `state` to a PKCE verifier for ten minutes. A
//!   session is redeemed at most once; an expired or mismatched callback spends it.
//! - **Access tokens** are HS256 JWTs valid for fifteen minutes. They are verified
//!   without touching storage, so they stay valid until `exp` even after logout.
//! - **Refresh tokens** are opaque and valid for seven days. Only their SHA-256 is
//!   stored. Each use rotates the token atomically: the presented token is revoked
//!   and a successor is issued, so a replayed token succeeds at most once.
//!
//! ## Layout
//!
//! [`auth`] holds the engine and [`auth::AuthService`] its RPC surface. [`store`]
//! defines the persistence traits with in-memory and Postgres backends.
//! [`provider`] talks to GitHub. [`api`] serves the RPCs over HTTP and [`client`]
//! calls them from other services.

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod provider;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#![allow(clippy::needless_for_each)]

use super::{
    error::ErrorBody,
    handlers::{health, oauth, tokens},
};
use crate::auth::{AuthResponse, InitiateOAuthResponse, LogoutResponse, TokenPair, UserProfile};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        oauth::initiate,
        oauth::callback,
        tokens::validate,
        tokens::refresh,
        tokens::logout,
    ),
    components(
        schemas(
            health::Health,
            oauth::InitiateRequest,
            oauth::CallbackRequest,
            tokens::AccessTokenRequest,
            tokens::RefreshRequest,
            InitiateOAuthResponse,
            AuthResponse,
            TokenPair,
            LogoutResponse,
            UserProfile,
            ErrorBody,
        )
    ),
    tags(
        (name = "oauth", description = "PKCE login through an external identity provider"),
        (name = "tokens", description = "Access token validation, refresh rotation and logout"),
        (name = "health", description = "Liveness and store reachability"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

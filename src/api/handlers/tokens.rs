use crate::{
    api::error::{invalid_request, ErrorBody},
    auth::{AuthService, LogoutResponse, TokenPair, UserProfile},
};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Clone)]
pub struct AccessTokenRequest {
    pub access_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl std::fmt::Debug for AccessTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenRequest")
            .field("access_token", &"***")
            .finish()
    }
}

impl std::fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/validate",
    request_body = AccessTokenRequest,
    responses (
        (status = 200, description = "Token is valid; current profile of its owner", body = UserProfile),
        (status = 401, description = "Invalid, malformed or expired token", body = ErrorBody),
        (status = 404, description = "Owner no longer exists", body = ErrorBody),
    ),
    tag= "tokens"
)]
pub async fn validate(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<AccessTokenRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_request("Missing payload");
    };

    match service.validate_token(&request.access_token).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses (
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token revoked or expired", body = ErrorBody),
        (status = 404, description = "Unknown refresh token or deleted owner", body = ErrorBody),
    ),
    tag= "tokens"
)]
pub async fn refresh(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_request("Missing payload");
    };

    match service.refresh_token(&request.refresh_token).await {
        Ok(pair) => Json(pair).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/logout",
    request_body = AccessTokenRequest,
    responses (
        (status = 200, description = "Refresh tokens revoked", body = LogoutResponse),
        (status = 401, description = "Invalid, malformed or expired token", body = ErrorBody),
    ),
    tag= "tokens"
)]
pub async fn logout(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<AccessTokenRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_request("Missing payload");
    };

    match service.logout(&request.access_token).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

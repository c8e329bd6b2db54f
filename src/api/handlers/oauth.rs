use crate::{
    api::error::{invalid_request, ErrorBody},
    auth::{AuthResponse, AuthService, InitiateOAuthResponse},
};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct InitiateRequest {
    /// Registered provider name, e.g. `github`.
    pub provider: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone)]
pub struct CallbackRequest {
    pub provider: String,
    pub code: String,
    pub state: String,
}

// code and state are single-use secrets
impl std::fmt::Debug for CallbackRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRequest")
            .field("provider", &self.provider)
            .field("code", &"***")
            .field("state", &crate::auth::truncate(&self.state, 4))
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/initiate",
    request_body = InitiateRequest,
    responses (
        (status = 200, description = "Authorization URL for the provider", body = InitiateOAuthResponse),
        (status = 400, description = "Unknown provider or bad request", body = ErrorBody),
        (status = 503, description = "Session could not be stored", body = ErrorBody),
    ),
    tag= "oauth"
)]
pub async fn initiate(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<InitiateRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_request("Missing payload");
    };
    if request.provider.is_empty() {
        return invalid_request("provider is required");
    }

    match service.initiate_oauth(&request.provider).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/callback",
    request_body = CallbackRequest,
    responses (
        (status = 200, description = "Login completed", body = AuthResponse),
        (status = 400, description = "Provider mismatch or bad request", body = ErrorBody),
        (status = 401, description = "Session expired", body = ErrorBody),
        (status = 404, description = "Unknown or already used state", body = ErrorBody),
        (status = 502, description = "Provider rejected the exchange", body = ErrorBody),
        (status = 504, description = "Provider or store deadline exceeded", body = ErrorBody),
    ),
    tag= "oauth"
)]
pub async fn callback(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<CallbackRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_request("Missing payload");
    };
    if request.code.is_empty() || request.state.is_empty() {
        return invalid_request("code and state are required");
    }

    match service
        .handle_oauth_callback(&request.provider, &request.code, &request.state)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

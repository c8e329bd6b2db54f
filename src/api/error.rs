use crate::auth::{AuthError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

/// Tag used for requests rejected before they reach the engine.
pub const INVALID_REQUEST: &str = "invalid_request";

/// Error body shared by every endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable tag, one of the engine error kinds or `invalid_request`.
    pub kind: String,
    pub message: String,
}

#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::SessionNotFound | ErrorKind::RefreshTokenNotFound | ErrorKind::UserNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::SessionExpired
        | ErrorKind::SignatureInvalid
        | ErrorKind::TokenMalformed
        | ErrorKind::TokenExpired
        | ErrorKind::RefreshTokenRevoked
        | ErrorKind::RefreshTokenExpired => StatusCode::UNAUTHORIZED,
        ErrorKind::ProviderMismatch | ErrorKind::UnsupportedProvider => StatusCode::BAD_REQUEST,
        ErrorKind::ExchangeFailed | ErrorKind::ProfileFetchFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::PersistenceFailure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            // Display omits the store detail; log the chain here instead.
            error!(kind = %kind, error = ?self, "request failed");
        } else {
            warn!(kind = %kind, "request rejected");
        }

        let body = ErrorBody {
            kind: kind.as_str().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) fn invalid_request(message: &str) -> Response {
    let body = ErrorBody {
        kind: INVALID_REQUEST.to_string(),
        message: message.to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

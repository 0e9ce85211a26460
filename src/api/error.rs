//! HTTP rendering of `ServiceError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::ServiceError;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'a str,
    message: String,
}

impl ServiceError {
    /// Status code for this error on the JSON API.
    ///
    /// Webhook deliveries answer a bad signature with 401 instead; see
    /// `render_webhook_error`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomUnavailable(_) | Self::AlreadyProcessed(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub(crate) fn render(status: StatusCode, err: &ServiceError) -> Response {
    // Internal details stay in the log.
    let message = match err {
        ServiceError::Internal(detail) => {
            error!(error = %detail, "internal error");
            "internal error".to_string()
        }
        other => other.to_string(),
    };
    let body = ErrorBody {
        error: ErrorDetail {
            kind: err.kind(),
            message,
        },
    };
    (status, Json(body)).into_response()
}

pub(crate) fn render_webhook_error(err: ServiceError) -> Response {
    let status = match err {
        ServiceError::InvalidSignature => StatusCode::UNAUTHORIZED,
        ref other => other.status_code(),
    };
    render(status, &err)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        render(self.status_code(), &self)
    }
}

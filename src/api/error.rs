//! Mapping of application errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::{AppError, AuthErrorKind};

use super::response::ApiResponse;
use super::state::AppContext;

/// An error ready to be rendered as a JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    /// Convert `err`, attaching its internal message only when `expose` is set.
    #[must_use]
    pub fn from_app(err: &AppError, expose: bool) -> Self {
        let status = status_for(err);
        if status.is_server_error() && !err.is_public() {
            tracing::error!(error = %err, "Request failed");
        }

        Self {
            status,
            message: err.public_message(),
            detail: (expose && !err.is_public()).then(|| err.to_string()),
        }
    }

    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Endpoint not found")
    }
}

/// HTTP status for an application error.
#[must_use]
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::Auth { kind } => match kind {
            AuthErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthErrorKind::NetworkRequestFailed => StatusCode::BAD_GATEWAY,
            k if k.is_input_problem() => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        },
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Storage { .. }
        | AppError::JsonParse { .. }
        | AppError::Config { .. }
        | AppError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::err(self.message, self.detail))).into_response()
    }
}

/// Attach the context's error-exposure policy to a fallible result.
pub trait OrReject<T> {
    fn or_reject(self, ctx: &AppContext) -> Result<T, ApiError>;
}

impl<T> OrReject<T> for crate::domain::Result<T> {
    fn or_reject(self, ctx: &AppContext) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_app(&e, ctx.expose_error_details()))
    }
}

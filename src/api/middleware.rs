//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::{AppError, AuthErrorKind};

use super::error::ApiError;
use super::state::AppContext;

/// Verify `Authorization: Bearer <token>` and stash the caller as an
/// [`AuthenticatedUser`](crate::domain::AuthenticatedUser) extension.
pub async fn require_auth(
    State(ctx): State<Arc<AppContext>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expose = ctx.expose_error_details();

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::from_app(&AppError::auth(AuthErrorKind::MissingToken), expose)
        })?;

    let user = ctx.accounts.verify_token(token).await.map_err(|e| {
        tracing::debug!(error = %e, "Token verification failed");
        let err = match e {
            AppError::Auth {
                kind: AuthErrorKind::NetworkRequestFailed,
            } => e,
            _ => AppError::auth(AuthErrorKind::InvalidToken),
        };
        ApiError::from_app(&err, expose)
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

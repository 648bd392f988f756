//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::application::parse_cookies;
use crate::domain::{
    AuthSession, AuthenticatedUser, CookieRecord, SyncReport, UserProfile, UserStats,
};
use crate::infrastructure::METRICS;

use super::error::{ApiError, OrReject};
use super::response::{ApiResponse, HealthResponse, SaveReceipt};
use super::state::AppContext;

type Ctx = State<Arc<AppContext>>;
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    cookies: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Unwrap a JSON body, answering 400 (or 413) in the usual envelope.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        } else {
            ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON body")
        }
    })
}

/// Liveness probe.
pub async fn health(State(ctx): Ctx) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.render(),
    )
}

pub async fn not_found() -> ApiError {
    ApiError::not_found()
}

pub async fn sign_in(
    State(ctx): Ctx,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let body = json_body(payload)?;
    let session = ctx
        .accounts
        .sign_in(&body.email, &body.password)
        .await
        .or_reject(&ctx)?;

    Ok(Json(ApiResponse::ok("Signed in successfully", session)))
}

pub async fn sign_up(
    State(ctx): Ctx,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthSession>>), ApiError> {
    let body = json_body(payload)?;
    let session = ctx
        .accounts
        .sign_up(&body.email, &body.password, body.display_name.as_deref())
        .await
        .or_reject(&ctx)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Account created successfully", session)),
    ))
}

pub async fn sign_out(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<ApiResponse<()>> {
    ctx.accounts.sign_out(&user);
    Json(ApiResponse::done("Signed out successfully"))
}

pub async fn reset_password(
    State(ctx): Ctx,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> ApiResult<()> {
    let body = json_body(payload)?;
    ctx.accounts
        .reset_password(&body.email)
        .await
        .or_reject(&ctx)?;

    Ok(Json(ApiResponse::done("Password reset email sent")))
}

pub async fn save_cookies(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> ApiResult<SaveReceipt> {
    let body = json_body(payload)?;

    let (Some(domain), Some(Value::Array(values))) = (body.domain, body.cookies) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Domain and cookies array are required",
        ));
    };

    let cookies = parse_cookies(values).or_reject(&ctx)?;
    let record = ctx
        .store
        .upsert(&user.uid, &domain, cookies)
        .await
        .or_reject(&ctx)?;

    Ok(Json(ApiResponse::ok(
        format!(
            "Saved {} cookies for {}",
            record.cookie_count, record.domain
        ),
        SaveReceipt {
            cookie_id: record.document_id(),
            domain: record.domain,
            cookie_count: record.cookie_count,
        },
    )))
}

pub async fn load_cookies(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
    Path(domain): Path<String>,
) -> ApiResult<CookieRecord> {
    let record = ctx.store.fetch(&user.uid, &domain).await.or_reject(&ctx)?;

    Ok(Json(ApiResponse::ok(
        format!(
            "Loaded {} cookies for {}",
            record.cookie_count, record.domain
        ),
        record,
    )))
}

pub async fn delete_cookies(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
    Path(domain): Path<String>,
) -> ApiResult<()> {
    ctx.store.remove(&user.uid, &domain).await.or_reject(&ctx)?;
    Ok(Json(ApiResponse::done(format!("Deleted cookies for {domain}"))))
}

pub async fn list_domains(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Vec<String>> {
    let domains = ctx.store.list_domains(&user.uid).await.or_reject(&ctx)?;
    Ok(Json(ApiResponse::ok(
        format!("Found {} domains", domains.len()),
        domains,
    )))
}

pub async fn stats(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<UserStats> {
    let stats = ctx.store.stats_for(&user.uid).await.or_reject(&ctx)?;
    Ok(Json(ApiResponse::ok("Statistics retrieved", stats)))
}

/// Push a local storage snapshot. Per-domain failures are reported in the
/// body; the request itself still succeeds.
pub async fn sync(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SyncReport> {
    let Value::Object(snapshot) = json_body(payload)? else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Sync body must be an object keyed by domain",
        ));
    };

    let report = ctx.reconciler.sync(&user.uid, &snapshot).await;

    Ok(Json(ApiResponse::ok(
        format!(
            "Synced {}/{} domains",
            report.synced_count, report.total_domains
        ),
        report,
    )))
}

pub async fn create_user(
    State(ctx): Ctx,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    let body = json_body(payload)?;
    let email = body.email.or(user.email);
    let display_name = body.display_name.or(user.display_name);

    let profile = ctx
        .accounts
        .create_profile(&user.uid, email.as_deref(), display_name.as_deref())
        .await
        .or_reject(&ctx)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User profile saved", profile)),
    ))
}

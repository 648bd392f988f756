//! HTTP API consumed by the browser extension.
//!
//! Routes live under `/api`; everything except sign-in, sign-up and
//! password reset requires a bearer token. `/health` and `/metrics` sit at
//! the root for probes and scrapers.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use state::AppContext;

/// Create the application router.
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let body_limit = ctx.config.server.body_limit_bytes;
    let timeout = Duration::from_secs(ctx.config.server.request_timeout_secs);
    let cors = cors_layer(&ctx.config.server.allowed_origins);

    let public = Router::new()
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/reset-password", post(handlers::reset_password));

    let protected = Router::new()
        .route("/auth/signout", post(handlers::sign_out))
        .route("/cookies/save", post(handlers::save_cookies))
        .route("/cookies/load/{domain}", get(handlers::load_cookies))
        .route("/cookies/{domain}", delete(handlers::delete_cookies))
        .route("/domains", get(handlers::list_domains))
        .route("/stats", get(handlers::stats))
        .route("/sync", post(handlers::sync))
        .route("/users", post(handlers::create_user))
        .route_layer(axum::middleware::from_fn_with_state(
            ctx.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", public.merge(protected))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(timeout_layer(timeout)),
        )
        .with_state(ctx)
}

/// Requests still running after `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Whether `origin` matches one of `patterns`; a trailing `*` matches any suffix.
#[must_use]
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns.iter().any(|p| match p.strip_suffix('*') {
        Some(prefix) => origin.starts_with(prefix),
        None => p == origin,
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|o| origin_allowed(&patterns, o))
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

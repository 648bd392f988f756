//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, HTTP, etc.).

pub mod auth;
pub mod config;
pub mod error;
pub mod models;

pub use auth::{AuthErrorKind, AuthSession, AuthenticatedUser};
pub use config::{AppConfig, IdentityConfig, StorageBackend};
pub use error::{AppError, Result};
pub use models::{
    normalize_domain, CookieEntry, CookieRecord, IndexRepair, SameSite,
    SyncOutcome, SyncReport, UserProfile, UserStats,
};

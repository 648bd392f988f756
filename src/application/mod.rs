//! Application layer - use cases and orchestration.
//!
//! This layer holds the cookie store, the sync reconciler and account
//! operations, written against the ports in [`ports`].

pub mod account_service;
pub mod cookie_store;
pub mod formatter;
pub mod parser;
pub mod ports;
pub mod reconciler;

pub use account_service::AccountService;
pub use cookie_store::CookieStore;
pub use formatter::{
    format_domains, format_json, format_repairs, format_stats, format_sync_report, OutputFormat,
};
pub use parser::parse_cookies;
pub use reconciler::SyncReconciler;

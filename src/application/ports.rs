//! Capability interfaces consumed by the application services.
//!
//! Storage and identity live behind these traits so the services never
//! depend on a concrete database or provider.

use async_trait::async_trait;

use crate::domain::{AuthSession, AuthenticatedUser, CookieRecord, Result, UserProfile};

/// Persistence for per-(user, domain) cookie records.
#[async_trait]
pub trait CookieRecordRepository: Send + Sync {
    /// Write a record with merge semantics.
    ///
    /// If a record already exists for the key, its `saved_at` is kept and
    /// everything else is replaced. Returns the record as stored.
    async fn save(&self, record: CookieRecord) -> Result<CookieRecord>;

    /// Read a record, `None` if absent.
    async fn find(&self, owner: &str, domain: &str) -> Result<Option<CookieRecord>>;

    /// Delete a record. Returns whether one existed.
    async fn delete(&self, owner: &str, domain: &str) -> Result<bool>;

    /// All records of one user.
    async fn list_for_owner(&self, owner: &str) -> Result<Vec<CookieRecord>>;

    /// Every user that owns at least one record.
    async fn owners(&self) -> Result<Vec<String>>;
}

/// Secondary per-user index of domains that have a stored record.
#[async_trait]
pub trait DomainIndex: Send + Sync {
    /// Idempotent set-union.
    async fn add(&self, user_id: &str, domain: &str) -> Result<()>;

    /// Idempotent set-difference.
    async fn remove(&self, user_id: &str, domain: &str) -> Result<()>;

    /// Domains of one user in lexicographic order.
    async fn list(&self, user_id: &str) -> Result<Vec<String>>;

    /// Every user with at least one index entry.
    async fn users(&self) -> Result<Vec<String>>;
}

/// Profile documents.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create or update a profile, keeping `created_at` of an existing one.
    async fn upsert_profile(&self, profile: UserProfile) -> Result<UserProfile>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

/// Third-party identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession>;

    /// Resolve a bearer token to the user it was issued for.
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;
}

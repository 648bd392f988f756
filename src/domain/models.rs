//! Domain models for stored cookie snapshots.
//!
//! These models represent the records kept per (user, domain) and the
//! reports produced when a local snapshot is synced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
    /// Attribute not set by the site.
    #[default]
    #[serde(rename = "unset")]
    Unset,
}

impl std::str::FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" | "no_restriction" => Ok(Self::None),
            "unset" | "unspecified" | "" => Ok(Self::Unset),
            _ => Err(format!("Unknown sameSite value: {s}")),
        }
    }
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

/// A single browser cookie. Only these fields are ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// `None` for session cookies.
    pub expires_at: Option<DateTime<Utc>>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

/// The stored cookie set for one (user, domain) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub owner_user_id: String,
    pub domain: String,
    pub cookies: Vec<CookieEntry>,
    /// Always equal to `cookies.len()`.
    pub cookie_count: usize,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CookieRecord {
    /// Build a fresh record stamped with `now`.
    ///
    /// `domain` must already be normalized.
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        domain: impl Into<String>,
        cookies: Vec<CookieEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            domain: domain.into(),
            cookie_count: cookies.len(),
            cookies,
            saved_at: now,
            updated_at: now,
        }
    }

    /// Composite document id, as used by document-style stores.
    #[must_use]
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.owner_user_id, self.domain)
    }

    /// Merge this write over an existing record: first-save time survives.
    #[must_use]
    pub fn merged_over(mut self, existing: Option<&Self>) -> Self {
        if let Some(existing) = existing {
            self.saved_at = existing.saved_at;
        }
        self
    }

    /// Summary line used by stats.
    #[must_use]
    pub fn summary(&self) -> DomainSummary {
        DomainSummary {
            domain: self.domain.clone(),
            cookie_count: self.cookie_count,
            saved_at: self.saved_at,
            updated_at: self.updated_at,
        }
    }
}

/// Normalize a domain for use as part of a record key.
///
/// # Errors
/// Returns a validation error if the domain is empty after trimming.
pub fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(AppError::validation("Domain is required"));
    }
    Ok(domain)
}

/// Per-domain entry of [`UserStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSummary {
    pub domain: String,
    pub cookie_count: usize,
    pub saved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate statistics over all of a user's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_domains: usize,
    pub total_cookies: usize,
    pub domains: Vec<DomainSummary>,
}

impl UserStats {
    /// Aggregate a set of records, ordered by domain.
    #[must_use]
    pub fn from_records(records: &[CookieRecord]) -> Self {
        let mut domains: Vec<DomainSummary> = records.iter().map(CookieRecord::summary).collect();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));

        Self {
            total_domains: domains.len(),
            total_cookies: domains.iter().map(|d| d.cookie_count).sum(),
            domains,
        }
    }
}

/// Profile document kept for each account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of syncing one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub domain: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    /// Successful outcome.
    pub fn saved(domain: impl Into<String>, saved_count: usize) -> Self {
        Self {
            domain: domain.into(),
            success: true,
            saved_count: Some(saved_count),
            error: None,
        }
    }

    /// Failed outcome.
    pub fn failed(domain: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            success: false,
            saved_count: None,
            error: Some(error.into()),
        }
    }
}

/// Report returned by a sync batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced_count: usize,
    /// Domains that carried a cookies array and were attempted.
    pub total_domains: usize,
    pub results: Vec<SyncOutcome>,
}

impl SyncReport {
    /// Record an outcome, counting successes.
    pub fn push(&mut self, outcome: SyncOutcome) {
        if outcome.success {
            self.synced_count += 1;
        }
        self.total_domains += 1;
        self.results.push(outcome);
    }

    /// Number of failed domains.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.total_domains - self.synced_count
    }
}

/// Result of reconciling one user's domain index against stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRepair {
    pub user_id: String,
    /// Domains with a record but missing from the index.
    pub added: Vec<String>,
    /// Index entries with no backing record.
    pub removed: Vec<String>,
}

impl IndexRepair {
    /// Whether the index already matched.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

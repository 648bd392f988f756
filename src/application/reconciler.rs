//! Synchronization of a locally cached cookie snapshot.
//!
//! The extension keeps one entry per domain in its local storage, next to
//! a handful of preference keys. A sync pushes every domain's cookies into
//! the record store and reports how each one went. One domain failing
//! never aborts the batch.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::domain::{Result, SyncOutcome, SyncReport};
use crate::infrastructure::metrics::{Metrics, METRICS};

use super::cookie_store::CookieStore;
use super::parser::{extract_cookie_array, parse_cookies};

/// Local storage keys that hold settings rather than domains.
pub const RESERVED_KEYS: [&str; 5] = [
    "__DOMAIN_LIST__",
    "autoSync",
    "syncInterval",
    "backupEnabled",
    "notificationsEnabled",
];

/// A local storage dump: key to cached payload.
pub type LocalSnapshot = Map<String, Value>;

/// Whether a snapshot key is a setting rather than a domain.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Pushes local snapshots into the cookie store.
#[derive(Clone)]
pub struct SyncReconciler {
    store: CookieStore,
    domain_timeout: Option<Duration>,
}

impl SyncReconciler {
    /// Create a reconciler without a per-domain deadline.
    #[must_use]
    pub const fn new(store: CookieStore) -> Self {
        Self {
            store,
            domain_timeout: None,
        }
    }

    /// Bound each domain's save; a save that runs past it becomes a failure.
    #[must_use]
    pub const fn with_domain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.domain_timeout = timeout;
        self
    }

    /// Sync every domain of `snapshot` for `user_id`.
    ///
    /// Domains are processed one after another in snapshot order. Reserved
    /// keys, undecodable payloads and payloads without a cookies array are
    /// skipped without an outcome.
    pub async fn sync(&self, user_id: &str, snapshot: &LocalSnapshot) -> SyncReport {
        tracing::info!(user = user_id, keys = snapshot.len(), "Starting sync...");
        Metrics::incr(&METRICS.sync_requests);

        let start = std::time::Instant::now();
        let mut report = SyncReport::default();

        for (domain, payload) in snapshot {
            if is_reserved_key(domain) {
                continue;
            }

            let Some(values) = extract_cookie_array(payload) else {
                tracing::debug!(domain = %domain, "Skipping malformed local payload");
                continue;
            };

            let outcome = match self.save_domain(user_id, domain, values).await {
                Ok(saved) => {
                    Metrics::incr(&METRICS.domains_synced);
                    SyncOutcome::saved(domain, saved)
                }
                Err(message) => {
                    Metrics::incr(&METRICS.domains_failed);
                    tracing::warn!(domain = %domain, error = %message, "Domain sync failed");
                    SyncOutcome::failed(domain, message)
                }
            };

            report.push(outcome);
        }

        tracing::info!(
            user = user_id,
            synced = report.synced_count,
            attempted = report.total_domains,
            duration_ms = start.elapsed().as_millis(),
            "Sync completed"
        );

        report
    }

    /// Save one domain, returning the stored count or a caller-safe message.
    async fn save_domain(
        &self,
        user_id: &str,
        domain: &str,
        values: Vec<Value>,
    ) -> std::result::Result<usize, String> {
        let cookies = parse_cookies(values).map_err(|e| e.public_message())?;
        let save = self.store.upsert(user_id, domain, cookies);

        let result: Result<_> = match self.domain_timeout {
            Some(limit) => match tokio::time::timeout(limit, save).await {
                Ok(result) => result,
                Err(_) => return Err("Timed out saving cookies".to_string()),
            },
            None => save.await,
        };

        result
            .map(|record| record.cookie_count)
            .map_err(|e| e.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::application::ports::CookieRecordRepository;
    use crate::domain::{AppError, CookieRecord};
    use crate::infrastructure::MemoryStore;

    /// Record store that fails (or stalls) writes for one domain.
    struct FlakyRecords {
        inner: Arc<MemoryStore>,
        bad_domain: &'static str,
        stall: bool,
    }

    #[async_trait]
    impl CookieRecordRepository for FlakyRecords {
        async fn save(&self, record: CookieRecord) -> Result<CookieRecord> {
            if record.domain == self.bad_domain {
                if self.stall {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                return Err(AppError::storage("write rejected"));
            }
            self.inner.save(record).await
        }
        async fn find(&self, owner: &str, domain: &str) -> Result<Option<CookieRecord>> {
            self.inner.find(owner, domain).await
        }
        async fn delete(&self, owner: &str, domain: &str) -> Result<bool> {
            self.inner.delete(owner, domain).await
        }
        async fn list_for_owner(&self, owner: &str) -> Result<Vec<CookieRecord>> {
            self.inner.list_for_owner(owner).await
        }
        async fn owners(&self) -> Result<Vec<String>> {
            self.inner.owners().await
        }
    }

    fn healthy() -> (SyncReconciler, CookieStore) {
        let mem = Arc::new(MemoryStore::new());
        let store = CookieStore::new(mem.clone(), mem);
        (SyncReconciler::new(store.clone()), store)
    }

    fn flaky(bad_domain: &'static str, stall: bool) -> (SyncReconciler, CookieStore) {
        let mem = Arc::new(MemoryStore::new());
        let records = Arc::new(FlakyRecords {
            inner: mem.clone(),
            bad_domain,
            stall,
        });
        let store = CookieStore::new(records, mem);
        (SyncReconciler::new(store.clone()), store)
    }

    fn payload(names: &[&str]) -> Value {
        let cookies: Vec<Value> = names.iter().map(|n| json!({ "name": n, "value": "1" })).collect();
        Value::String(json!({ "cookies": cookies, "timestamp": 0 }).to_string())
    }

    fn snapshot(value: Value) -> LocalSnapshot {
        match value {
            Value::Object(map) => map,
            _ => panic!("snapshot must be an object"),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let (reconciler, store) = flaky("b.com", false);
        let snap = snapshot(json!({
            "a.com": payload(&["x"]),
            "b.com": payload(&["y"]),
            "c.com": payload(&["z", "w"]),
        }));

        let report = reconciler.sync("u1", &snap).await;

        assert_eq!(report.synced_count, 2);
        assert_eq!(report.total_domains, 3);
        let failed: Vec<_> = report.results.iter().filter(|o| !o.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].domain, "b.com");

        assert_eq!(store.fetch("u1", "a.com").await.unwrap().cookie_count, 1);
        assert_eq!(store.fetch("u1", "c.com").await.unwrap().cookie_count, 2);
        assert!(store.fetch("u1", "b.com").await.is_err());
        assert_eq!(store.list_domains("u1").await.unwrap(), vec!["a.com", "c.com"]);
    }

    #[tokio::test]
    async fn test_reserved_keys_excluded() {
        let (reconciler, _) = healthy();
        let snap = snapshot(json!({
            "autoSync": "true",
            "syncInterval": json!({ "cookies": [] }).to_string(),
            "__DOMAIN_LIST__": "[\"a.com\",\"b.com\"]",
            "a.com": payload(&["x"]),
            "b.com": payload(&[]),
        }));

        let report = reconciler.sync("u1", &snap).await;

        assert_eq!(report.total_domains, 2);
        assert_eq!(report.synced_count, 2);
        assert!(report.results.iter().all(|o| !is_reserved_key(&o.domain)));
    }

    #[tokio::test]
    async fn test_malformed_payload_skipped() {
        let (reconciler, store) = healthy();
        let snap = snapshot(json!({
            "broken.com": "{this is not json",
            "nocookies.com": json!({ "timestamp": 1 }).to_string(),
            "good.com": payload(&["x"]),
        }));

        let report = reconciler.sync("u1", &snap).await;

        assert_eq!(report.total_domains, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].domain, "good.com");
        assert_eq!(store.list_domains("u1").await.unwrap(), vec!["good.com"]);
    }

    #[tokio::test]
    async fn test_invalid_cookie_entry_is_a_failure_outcome() {
        let (reconciler, _) = healthy();
        let snap = snapshot(json!({
            "a.com": json!({ "cookies": [{ "value": "no name" }] }).to_string(),
        }));

        let report = reconciler.sync("u1", &snap).await;

        assert_eq!(report.total_domains, 1);
        assert_eq!(report.synced_count, 0);
        assert!(report.results[0].error.as_deref().unwrap().starts_with("Cookie 0"));
    }

    #[tokio::test]
    async fn test_resync_converges() {
        let (reconciler, store) = healthy();
        let snap = snapshot(json!({
            "a.com": payload(&["x", "y"]),
            "b.com": payload(&["z"]),
        }));

        reconciler.sync("u1", &snap).await;
        let first = store.stats_for("u1").await.unwrap();
        reconciler.sync("u1", &snap).await;
        let second = store.stats_for("u1").await.unwrap();

        assert_eq!(first.total_cookies, second.total_cookies);
        assert_eq!(first.total_domains, second.total_domains);
    }

    #[tokio::test]
    async fn test_storage_error_message_is_generic() {
        let (reconciler, _) = flaky("a.com", false);
        let snap = snapshot(json!({ "a.com": payload(&["x"]) }));

        let report = reconciler.sync("u1", &snap).await;
        assert_eq!(report.results[0].error.as_deref(), Some("Something went wrong"));
    }

    #[tokio::test]
    async fn test_domain_timeout_demotes_stall_to_failure() {
        let (reconciler, _) = flaky("slow.com", true);
        let reconciler = reconciler.with_domain_timeout(Some(Duration::from_millis(50)));
        let snap = snapshot(json!({
            "fast.com": payload(&["x"]),
            "slow.com": payload(&["y"]),
        }));

        let report = reconciler.sync("u1", &snap).await;

        assert_eq!(report.synced_count, 1);
        let slow = report.results.iter().find(|o| o.domain == "slow.com").unwrap();
        assert_eq!(slow.error.as_deref(), Some("Timed out saving cookies"));
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let (reconciler, _) = healthy();
        let body = format!(
            r#"{{"zeta.com": {}, "alpha.com": {}, "mid.com": {}}}"#,
            payload(&["a"]),
            payload(&["b"]),
            payload(&["c"]),
        );
        let snap: LocalSnapshot = serde_json::from_str(&body).unwrap();

        let report = reconciler.sync("u1", &snap).await;

        let order: Vec<&str> = report.results.iter().map(|o| o.domain.as_str()).collect();
        assert_eq!(order, vec!["zeta.com", "alpha.com", "mid.com"]);
    }
}

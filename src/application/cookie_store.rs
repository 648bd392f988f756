//! Cookie record store service.
//!
//! Owns the per-(user, domain) record lifecycle and keeps the domain
//! index in step with it. Index maintenance is best-effort: a failed
//! index update is logged and counted, never returned to the caller.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    normalize_domain, AppError, CookieEntry, CookieRecord, IndexRepair, Result, UserStats,
};
use crate::infrastructure::metrics::{Metrics, METRICS};

use super::ports::{CookieRecordRepository, DomainIndex};

/// Which index mutation a record write triggers.
#[derive(Debug, Clone, Copy)]
enum IndexAction {
    Add,
    Remove,
}

/// Service for storing and reading cookie records.
#[derive(Clone)]
pub struct CookieStore {
    records: Arc<dyn CookieRecordRepository>,
    index: Arc<dyn DomainIndex>,
}

impl CookieStore {
    /// Create a store over the given record repository and index.
    #[must_use]
    pub fn new(records: Arc<dyn CookieRecordRepository>, index: Arc<dyn DomainIndex>) -> Self {
        Self { records, index }
    }

    /// Save a domain's cookies, replacing any previous set.
    ///
    /// # Errors
    /// Returns a validation error for an empty domain, or a storage error
    /// if the record write fails. Index failures are not reported.
    pub async fn upsert(
        &self,
        user_id: &str,
        domain: &str,
        cookies: Vec<CookieEntry>,
    ) -> Result<CookieRecord> {
        let domain = normalize_domain(domain)?;
        let record = CookieRecord::new(user_id, &domain, cookies, Utc::now());

        let stored = self.records.save(record).await?;
        tracing::debug!(
            user = user_id,
            domain = %stored.domain,
            cookies = stored.cookie_count,
            "Saved cookie record"
        );

        self.update_index(user_id, &stored.domain, IndexAction::Add)
            .await;

        Ok(stored)
    }

    /// Read a domain's record.
    ///
    /// # Errors
    /// Returns `NotFound` if no record exists.
    pub async fn fetch(&self, user_id: &str, domain: &str) -> Result<CookieRecord> {
        let domain = normalize_domain(domain)?;
        self.records
            .find(user_id, &domain)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No cookies found for {domain}")))
    }

    /// Delete a domain's record and drop it from the index.
    ///
    /// Deleting an absent record succeeds. If the delete itself fails the
    /// index is left untouched.
    ///
    /// # Errors
    /// Returns a storage error if the delete fails.
    pub async fn remove(&self, user_id: &str, domain: &str) -> Result<()> {
        let domain = normalize_domain(domain)?;

        let existed = self.records.delete(user_id, &domain).await?;
        if !existed {
            tracing::debug!(user = user_id, domain = %domain, "Delete of absent record");
        }

        self.update_index(user_id, &domain, IndexAction::Remove)
            .await;

        Ok(())
    }

    /// Aggregate counts over all of a user's records.
    ///
    /// # Errors
    /// Returns a storage error if records cannot be listed.
    pub async fn stats_for(&self, user_id: &str) -> Result<UserStats> {
        let records = self.records.list_for_owner(user_id).await?;
        Ok(UserStats::from_records(&records))
    }

    /// Domains the index lists for a user.
    ///
    /// # Errors
    /// Returns a storage error if the index cannot be read.
    pub async fn list_domains(&self, user_id: &str) -> Result<Vec<String>> {
        self.index.list(user_id).await
    }

    /// Bring one user's index back in line with their records.
    ///
    /// # Errors
    /// Returns a storage error if either side cannot be read or an
    /// index mutation fails.
    pub async fn repair_index(&self, user_id: &str) -> Result<IndexRepair> {
        let present: BTreeSet<String> = self
            .records
            .list_for_owner(user_id)
            .await?
            .into_iter()
            .map(|r| r.domain)
            .collect();
        let indexed: BTreeSet<String> = self.index.list(user_id).await?.into_iter().collect();

        let mut repair = IndexRepair {
            user_id: user_id.to_string(),
            ..IndexRepair::default()
        };

        // Requests run alongside the sweep, so each candidate is checked
        // against the record as it is now before the index is touched.
        for domain in present.difference(&indexed) {
            if !self.record_exists(user_id, domain).await? {
                continue;
            }
            self.index.add(user_id, domain).await?;
            repair.added.push(domain.clone());
        }
        for domain in indexed.difference(&present) {
            if self.record_exists(user_id, domain).await? {
                continue;
            }
            self.index.remove(user_id, domain).await?;
            repair.removed.push(domain.clone());
        }

        if !repair.is_clean() {
            let fixed = repair.added.len() + repair.removed.len();
            METRICS
                .index_repairs
                .fetch_add(fixed as u64, std::sync::atomic::Ordering::Relaxed);
            tracing::warn!(
                user = user_id,
                added = repair.added.len(),
                removed = repair.removed.len(),
                "Repaired domain index drift"
            );
        }

        Ok(repair)
    }

    /// Repair the index of every user known to either side.
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub async fn repair_all(&self) -> Result<Vec<IndexRepair>> {
        let mut users: BTreeSet<String> = self.records.owners().await?.into_iter().collect();
        users.extend(self.index.users().await?);

        let mut repairs = Vec::with_capacity(users.len());
        for user in &users {
            repairs.push(self.repair_index(user).await?);
        }
        Ok(repairs)
    }

    async fn record_exists(&self, user_id: &str, domain: &str) -> Result<bool> {
        Ok(self.records.find(user_id, domain).await?.is_some())
    }

    async fn update_index(&self, user_id: &str, domain: &str, action: IndexAction) {
        let result = match action {
            IndexAction::Add => self.index.add(user_id, domain).await,
            IndexAction::Remove => self.index.remove(user_id, domain).await,
        };

        if let Err(e) = result {
            Metrics::incr(&METRICS.index_update_failures);
            tracing::warn!(
                user = user_id,
                domain = domain,
                action = ?action,
                error = %e,
                "Domain index update failed; index may have drifted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SameSite;
    use crate::infrastructure::MemoryStore;
    use async_trait::async_trait;

    /// Index that rejects every mutation but can still be read.
    struct BrokenIndex(Arc<MemoryStore>);

    #[async_trait]
    impl DomainIndex for BrokenIndex {
        async fn add(&self, _: &str, _: &str) -> Result<()> {
            Err(AppError::storage("index unavailable"))
        }
        async fn remove(&self, _: &str, _: &str) -> Result<()> {
            Err(AppError::storage("index unavailable"))
        }
        async fn list(&self, user_id: &str) -> Result<Vec<String>> {
            self.0.list(user_id).await
        }
        async fn users(&self) -> Result<Vec<String>> {
            DomainIndex::users(self.0.as_ref()).await
        }
    }

    /// Record store whose deletes always fail.
    struct UndeletableRecords(Arc<MemoryStore>);

    #[async_trait]
    impl CookieRecordRepository for UndeletableRecords {
        async fn save(&self, record: CookieRecord) -> Result<CookieRecord> {
            self.0.save(record).await
        }
        async fn find(&self, owner: &str, domain: &str) -> Result<Option<CookieRecord>> {
            self.0.find(owner, domain).await
        }
        async fn delete(&self, _: &str, _: &str) -> Result<bool> {
            Err(AppError::storage("delete rejected"))
        }
        async fn list_for_owner(&self, owner: &str) -> Result<Vec<CookieRecord>> {
            self.0.list_for_owner(owner).await
        }
        async fn owners(&self) -> Result<Vec<String>> {
            self.0.owners().await
        }
    }

    /// A request that lands while the sweep is between its two reads.
    #[derive(Clone, Copy)]
    enum Interleaved {
        Save(&'static str),
        Delete(&'static str),
    }

    /// Index that applies one interleaved request the first time it is
    /// listed, after the sweep has already read the records.
    struct InterleavingIndex {
        mem: Arc<MemoryStore>,
        pending: parking_lot::Mutex<Option<Interleaved>>,
    }

    impl InterleavingIndex {
        fn new(mem: Arc<MemoryStore>, request: Interleaved) -> Self {
            Self {
                mem,
                pending: parking_lot::Mutex::new(Some(request)),
            }
        }
    }

    #[async_trait]
    impl DomainIndex for InterleavingIndex {
        async fn add(&self, user_id: &str, domain: &str) -> Result<()> {
            self.mem.add(user_id, domain).await
        }
        async fn remove(&self, user_id: &str, domain: &str) -> Result<()> {
            DomainIndex::remove(self.mem.as_ref(), user_id, domain).await
        }
        async fn list(&self, user_id: &str) -> Result<Vec<String>> {
            let request = self.pending.lock().take();
            let store = CookieStore::new(self.mem.clone(), self.mem.clone());
            match request {
                Some(Interleaved::Save(domain)) => {
                    store.upsert(user_id, domain, vec![]).await?;
                }
                Some(Interleaved::Delete(domain)) => store.remove(user_id, domain).await?,
                None => {}
            }
            self.mem.list(user_id).await
        }
        async fn users(&self) -> Result<Vec<String>> {
            DomainIndex::users(self.mem.as_ref()).await
        }
    }

    fn cookie(name: &str) -> CookieEntry {
        CookieEntry {
            name: name.to_string(),
            value: format!("{name}-value"),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires_at: None,
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
        }
    }

    fn memory_store() -> (CookieStore, Arc<MemoryStore>) {
        let mem = Arc::new(MemoryStore::new());
        (CookieStore::new(mem.clone(), mem.clone()), mem)
    }

    #[tokio::test]
    async fn test_upsert_then_fetch() {
        let (store, _) = memory_store();
        let cookies = vec![cookie("sid"), cookie("pref")];

        store.upsert("u1", "Example.com", cookies.clone()).await.unwrap();
        let record = store.fetch("u1", "example.com").await.unwrap();

        assert_eq!(record.cookies, cookies);
        assert_eq!(record.cookie_count, 2);
        assert_eq!(record.domain, "example.com");
        assert_eq!(store.list_domains("u1").await.unwrap(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_empty_cookie_set_is_a_record() {
        let (store, _) = memory_store();

        store.upsert("u1", "example.com", vec![]).await.unwrap();
        let record = store.fetch("u1", "example.com").await.unwrap();

        assert!(record.cookies.is_empty());
        assert_eq!(record.cookie_count, 0);
    }

    #[tokio::test]
    async fn test_saved_at_survives_resave() {
        let (store, _) = memory_store();

        let first = store.upsert("u1", "a.com", vec![cookie("x")]).await.unwrap();
        let second = store.upsert("u1", "a.com", vec![]).await.unwrap();

        assert_eq!(second.saved_at, first.saved_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.cookie_count, 0);
    }

    #[tokio::test]
    async fn test_empty_domain_rejected() {
        let (store, _) = memory_store();
        let err = store.upsert("u1", "  ", vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let (store, _) = memory_store();
        let err = store.fetch("u1", "nowhere.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_then_list() {
        let (store, _) = memory_store();
        store.upsert("u1", "a.com", vec![cookie("x")]).await.unwrap();
        store.upsert("u1", "b.com", vec![cookie("y")]).await.unwrap();

        store.remove("u1", "a.com").await.unwrap();

        assert_eq!(store.list_domains("u1").await.unwrap(), vec!["b.com"]);
        assert!(store.fetch("u1", "a.com").await.is_err());
        // Absent record: still fine.
        store.remove("u1", "a.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_for_user_without_records() {
        let (store, _) = memory_store();
        let stats = store.stats_for("nobody").await.unwrap();
        assert_eq!(stats.total_domains, 0);
        assert_eq!(stats.total_cookies, 0);
        assert!(stats.domains.is_empty());
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let (store, _) = memory_store();
        store.upsert("u1", "a.com", vec![cookie("x"), cookie("y")]).await.unwrap();
        store.upsert("u1", "b.com", vec![cookie("z")]).await.unwrap();
        store.upsert("u2", "c.com", vec![cookie("w")]).await.unwrap();

        let stats = store.stats_for("u1").await.unwrap();
        assert_eq!(stats.total_domains, 2);
        assert_eq!(stats.total_cookies, 3);
    }

    #[tokio::test]
    async fn test_index_failure_does_not_fail_upsert() {
        let mem = Arc::new(MemoryStore::new());
        let store = CookieStore::new(mem.clone(), Arc::new(BrokenIndex(mem.clone())));

        let record = store.upsert("u1", "a.com", vec![cookie("x")]).await.unwrap();
        assert_eq!(record.cookie_count, 1);
        // Record is there, index is not.
        assert!(store.fetch("u1", "a.com").await.is_ok());
        assert!(store.list_domains("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repair_restores_index() {
        let mem = Arc::new(MemoryStore::new());
        let broken = CookieStore::new(mem.clone(), Arc::new(BrokenIndex(mem.clone())));
        broken.upsert("u1", "a.com", vec![cookie("x")]).await.unwrap();

        let healthy = CookieStore::new(mem.clone(), mem.clone());
        healthy.upsert("u1", "b.com", vec![]).await.unwrap();
        // Orphan: record deleted but index entry kept.
        broken.remove("u1", "b.com").await.unwrap();

        let repair = healthy.repair_index("u1").await.unwrap();
        assert_eq!(repair.added, vec!["a.com"]);
        assert_eq!(repair.removed, vec!["b.com"]);
        assert_eq!(healthy.list_domains("u1").await.unwrap(), vec!["a.com"]);

        assert!(healthy.repair_index("u1").await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_repair_all_covers_index_only_users() {
        let (store, mem) = memory_store();
        mem.add("ghost", "gone.com").await.unwrap();
        store.upsert("u1", "a.com", vec![]).await.unwrap();

        let repairs = store.repair_all().await.unwrap();
        assert_eq!(repairs.len(), 2);
        assert!(store.list_domains("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_index_alone() {
        let mem = Arc::new(MemoryStore::new());
        CookieStore::new(mem.clone(), mem.clone())
            .upsert("u1", "a.com", vec![cookie("x")])
            .await
            .unwrap();

        let store = CookieStore::new(Arc::new(UndeletableRecords(mem.clone())), mem.clone());
        let err = store.remove("u1", "a.com").await.unwrap_err();

        assert!(matches!(err, AppError::Storage { .. }));
        assert_eq!(store.list_domains("u1").await.unwrap(), vec!["a.com"]);
        assert!(store.fetch("u1", "a.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_repair_keeps_entry_saved_during_sweep() {
        let mem = Arc::new(MemoryStore::new());
        let index = Arc::new(InterleavingIndex::new(mem.clone(), Interleaved::Save("new.com")));
        let store = CookieStore::new(mem.clone(), index);

        let repair = store.repair_index("u1").await.unwrap();

        assert!(repair.is_clean());
        assert!(mem.find("u1", "new.com").await.unwrap().is_some());
        assert_eq!(mem.list("u1").await.unwrap(), vec!["new.com"]);
    }

    #[tokio::test]
    async fn test_repair_does_not_readd_entry_deleted_during_sweep() {
        let mem = Arc::new(MemoryStore::new());
        CookieStore::new(mem.clone(), mem.clone())
            .upsert("u1", "old.com", vec![])
            .await
            .unwrap();
        let index = Arc::new(InterleavingIndex::new(mem.clone(), Interleaved::Delete("old.com")));
        let store = CookieStore::new(mem.clone(), index);

        let repair = store.repair_index("u1").await.unwrap();

        assert!(repair.is_clean());
        assert!(mem.find("u1", "old.com").await.unwrap().is_none());
        assert!(mem.list("u1").await.unwrap().is_empty());
    }
}

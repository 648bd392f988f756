//! In-process store.
//!
//! Implements every storage port over `BTreeMap`s. Used for `serve --in-memory`
//! and as the backing store in tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{CookieRecordRepository, DomainIndex, UserRepository};
use crate::domain::{CookieRecord, Result, UserProfile};

type RecordKey = (String, String);

/// Volatile store backed by ordered maps.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordKey, CookieRecord>>,
    index: RwLock<BTreeMap<String, BTreeSet<String>>>,
    profiles: RwLock<BTreeMap<String, UserProfile>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(owner: &str, domain: &str) -> RecordKey {
    (owner.to_string(), domain.to_string())
}

#[async_trait]
impl CookieRecordRepository for MemoryStore {
    async fn save(&self, record: CookieRecord) -> Result<CookieRecord> {
        let mut records = self.records.write();
        let k = key(&record.owner_user_id, &record.domain);
        let stored = record.merged_over(records.get(&k));
        records.insert(k, stored.clone());
        Ok(stored)
    }

    async fn find(&self, owner: &str, domain: &str) -> Result<Option<CookieRecord>> {
        Ok(self.records.read().get(&key(owner, domain)).cloned())
    }

    async fn delete(&self, owner: &str, domain: &str) -> Result<bool> {
        Ok(self.records.write().remove(&key(owner, domain)).is_some())
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<CookieRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.owner_user_id == owner)
            .cloned()
            .collect())
    }

    async fn owners(&self) -> Result<Vec<String>> {
        let owners: BTreeSet<String> = self.records.read().keys().map(|(o, _)| o.clone()).collect();
        Ok(owners.into_iter().collect())
    }
}

#[async_trait]
impl DomainIndex for MemoryStore {
    async fn add(&self, user_id: &str, domain: &str) -> Result<()> {
        self.index
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(domain.to_string());
        Ok(())
    }

    async fn remove(&self, user_id: &str, domain: &str) -> Result<()> {
        if let Some(domains) = self.index.write().get_mut(user_id) {
            domains.remove(domain);
        }
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .index
            .read()
            .get(user_id)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn users(&self) -> Result<Vec<String>> {
        Ok(self
            .index
            .read()
            .iter()
            .filter(|(_, domains)| !domains.is_empty())
            .map(|(user, _)| user.clone())
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn upsert_profile(&self, mut profile: UserProfile) -> Result<UserProfile> {
        let mut profiles = self.profiles.write();
        if let Some(existing) = profiles.get(&profile.user_id) {
            profile.created_at = existing.created_at;
        }
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_add_is_idempotent() {
        let store = MemoryStore::new();
        store.add("u1", "a.com").await.unwrap();
        store.add("u1", "a.com").await.unwrap();
        assert_eq!(store.list("u1").await.unwrap(), vec!["a.com"]);
    }

    #[tokio::test]
    async fn test_index_remove_is_idempotent() {
        let store = MemoryStore::new();
        store.add("u1", "a.com").await.unwrap();
        store.remove("u1", "a.com").await.unwrap();
        store.remove("u1", "a.com").await.unwrap();
        store.remove("nobody", "a.com").await.unwrap();
        assert!(store.list("u1").await.unwrap().is_empty());
        assert!(DomainIndex::users(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_lists_lexicographically() {
        let store = MemoryStore::new();
        for d in ["c.com", "a.com", "b.com"] {
            store.add("u1", d).await.unwrap();
        }
        assert_eq!(store.list("u1").await.unwrap(), vec!["a.com", "b.com", "c.com"]);
    }
}

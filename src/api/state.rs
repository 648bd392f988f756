//! Services shared across handlers and commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::ports::{
    CookieRecordRepository, DomainIndex, IdentityProvider, UserRepository,
};
use crate::application::{AccountService, CookieStore, SyncReconciler};
use crate::domain::{AppConfig, Result, StorageBackend};
use crate::infrastructure::{IdentityToolkitClient, LocalStorage, MemoryStore};

/// Everything a request needs, built once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub store: CookieStore,
    pub reconciler: SyncReconciler,
    pub accounts: AccountService,
    pub start_time: Instant,
}

impl AppContext {
    /// Wire services over explicit adapters.
    #[must_use]
    pub fn new(
        config: AppConfig,
        records: Arc<dyn CookieRecordRepository>,
        index: Arc<dyn DomainIndex>,
        users: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let store = CookieStore::new(records, index);
        let domain_timeout = (config.sync.domain_timeout_ms > 0)
            .then(|| Duration::from_millis(config.sync.domain_timeout_ms));

        Self {
            reconciler: SyncReconciler::new(store.clone()).with_domain_timeout(domain_timeout),
            accounts: AccountService::new(identity, users),
            store,
            config,
            start_time: Instant::now(),
        }
    }

    /// Build the configured storage backend and identity client.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or the HTTP client
    /// cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let identity = Arc::new(IdentityToolkitClient::new(&config.identity)?);

        match config.storage.backend {
            StorageBackend::Sqlite => {
                let db_path = config.storage_db_path();
                let storage = Arc::new(LocalStorage::open(&db_path)?);
                tracing::info!(path = %db_path.display(), "Opened cookie database");
                Ok(Self::new(
                    config,
                    storage.clone(),
                    storage.clone(),
                    storage,
                    identity,
                ))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; records are lost on shutdown");
                let storage = Arc::new(MemoryStore::new());
                Ok(Self::new(
                    config,
                    storage.clone(),
                    storage.clone(),
                    storage,
                    identity,
                ))
            }
        }
    }

    /// Whether error responses may carry internal details.
    #[must_use]
    pub fn expose_error_details(&self) -> bool {
        self.config.server.expose_error_details()
    }
}

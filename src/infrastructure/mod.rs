//! Infrastructure layer - external adapters (database, identity, config).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod identity;
pub mod local_storage;
pub mod memory_store;
pub mod metrics;

pub use config::{config_file_path, ensure_config_exists, load_config};
pub use identity::IdentityToolkitClient;
pub use local_storage::LocalStorage;
pub use memory_store::MemoryStore;
pub use metrics::METRICS;

pub mod disk;
pub mod memory;

use crate::core::config::{AppConfig, StorageDriver};
use crate::core::store::TransactionStore;
use anyhow::{Context, Result};
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;
use tracing::debug;

/// Opens the storage driver selected in the configuration.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn TransactionStore>> {
    match config.storage.driver {
        StorageDriver::Memory => {
            debug!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageDriver::Disk => {
            let path = config.default_data_path()?.join("db");
            let store = DiskStore::open(&path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

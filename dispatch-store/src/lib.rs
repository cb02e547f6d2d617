pub mod app_config;
pub mod error;
pub mod file_repo;
pub mod memory;
pub mod redis_repo;

pub use error::StorageError;
pub use file_repo::FileStorage;
pub use memory::MemoryStorage;
pub use redis_repo::RedisStorage;

use app_config::{StorageBackend, StorageConfig};
use dispatch_core::KeyValueStorage;
use std::sync::Arc;
use tracing::info;

/// Build the configured storage back-end, scoped to one mechanic.
pub async fn open_storage(config: &StorageConfig, scope: &str) -> Result<Arc<dyn KeyValueStorage>, StorageError> {
    let storage: Arc<dyn KeyValueStorage> = match config.backend {
        StorageBackend::File => {
            let storage = FileStorage::new(config.path.join(scope)).await?;
            info!(dir = %storage.dir().display(), "Using file offer storage");
            Arc::new(storage)
        }
        StorageBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| StorageError::Config("storage.redis_url is required for the redis backend".into()))?;
            Arc::new(RedisStorage::new(url, scope)?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory offer storage, offers will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };
    Ok(storage)
}

use async_trait::async_trait;
use dispatch_core::{CoreResult, KeyValueStorage};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn load(&self, namespace: &str) -> CoreResult<Option<String>> {
        Ok(self.entries.read().await.get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, value: &str) -> CoreResult<()> {
        self.entries
            .write()
            .await
            .insert(namespace.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> CoreResult<()> {
        self.entries.write().await.remove(namespace);
        Ok(())
    }
}

use async_trait::async_trait;

use crate::CoreResult;

/// Durable string storage addressed by namespace, the shape of a browser's local storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn load(&self, namespace: &str) -> CoreResult<Option<String>>;

    async fn save(&self, namespace: &str, value: &str) -> CoreResult<()>;

    async fn clear(&self, namespace: &str) -> CoreResult<()>;
}

use async_trait::async_trait;
use dispatch_core::{CoreResult, KeyValueStorage};
use redis::AsyncCommands;
use tracing::debug;

use crate::error::StorageError;

/// Offer state kept in Redis under `dispatch:{scope}:{namespace}`.
#[derive(Clone)]
pub struct RedisStorage {
    client: redis::Client,
    scope: String,
}

impl RedisStorage {
    pub fn new(connection_string: &str, scope: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            scope: scope.to_string(),
        })
    }

    fn key(&self, namespace: &str) -> String {
        format!("dispatch:{}:{}", self.scope, namespace)
    }
}

#[async_trait]
impl KeyValueStorage for RedisStorage {
    async fn load(&self, namespace: &str) -> CoreResult<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StorageError::from)?;
        let raw: Option<String> = conn.get(self.key(namespace)).await.map_err(StorageError::from)?;
        Ok(raw)
    }

    async fn save(&self, namespace: &str, value: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StorageError::from)?;
        let key = self.key(namespace);
        conn.set::<_, _, ()>(&key, value).await.map_err(StorageError::from)?;
        debug!(key = %key, bytes = value.len(), "Saved offer state");
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(StorageError::from)?;
        conn.del::<_, ()>(self.key(namespace)).await.map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_scoped_per_mechanic() {
        let storage = RedisStorage::new("redis://127.0.0.1:6379", "mech-42").unwrap();
        assert_eq!(storage.key("mechanic_requests_v1"), "dispatch:mech-42:mechanic_requests_v1");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(RedisStorage::new("not a url", "mech-42").is_err());
    }
}

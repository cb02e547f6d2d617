use dispatch_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Storage misconfigured: {0}")]
    Config(String),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Storage(err.to_string())
    }
}

use crate::store::KvError;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] KvError),
}

pub type HubResult<T> = std::result::Result<T, HubError>;

use thiserror::Error;

mod timestamp;
pub mod transcript;

pub use transcript::{HistoryEntry, Interaction, Message, Role, Transcript};

#[derive(Error, Debug)]
pub enum ConvoError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error ({backend}): {message}")]
    StorageError { backend: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid conversation id: {0:?}")]
    InvalidConversationId(String),
}

impl ConvoError {
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageError {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ConvoError>;

/// Rejects identifiers that cannot be used verbatim as a file or object name.
pub fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    let invalid = conversation_id.trim().is_empty()
        || conversation_id.contains(['/', '\\'])
        || conversation_id.contains("..")
        || conversation_id.chars().any(char::is_control);

    if invalid {
        return Err(ConvoError::InvalidConversationId(conversation_id.to_string()));
    }
    Ok(())
}

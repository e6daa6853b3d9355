/// Error types for the chat core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("A turn is already in flight for the active conversation")]
    TurnInProgress,

    #[error("Nothing to send: message is empty and no files are attached")]
    EmptySubmit,
}

pub type Result<T> = std::result::Result<T, ChatError>;

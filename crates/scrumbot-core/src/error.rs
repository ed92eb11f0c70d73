//! Error types shared across ScrumBot crates.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ScrumError>;

#[derive(Error, Debug)]
pub enum ScrumError {
    /// Datastore failure (open, migrate, query).
    #[error("Database error: {0}")]
    Database(String),

    /// Outbound call to the chat platform failed or was rejected.
    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

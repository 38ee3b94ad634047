//! Error types for the core crate.

use thiserror::Error;

use crate::config::ConfigError;
use crate::items::ItemId;

/// Board errors.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

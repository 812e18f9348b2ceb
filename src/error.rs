//! Crate-wide error type
//!
//! Domain errors carry enough context to be logged at the channel boundary;
//! transport errors from reqwest/serde convert transparently.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// The ledger snapshot could not be written. The in-memory append has
    /// already happened, so memory and disk may diverge until the next
    /// successful flush.
    #[error("failed to persist ledger snapshot to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to store attachment for report #{id}: {source}")]
    Attachment {
        id: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("attachment not found: {0}")]
    AttachmentMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("WhatsApp Cloud API error: {0}")]
    CloudApi(String),

    #[error("Google Sheets error: {0}")]
    Sheets(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

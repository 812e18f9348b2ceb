//! Attachment Store
//!
//! Report photos live under a fixed uploads root, one file per report,
//! named from the report id. The ledger stores the returned path verbatim.

use crate::error::{BotError, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Open the store, creating the uploads root if absent.
    pub fn open<P: AsRef<Path>>(root: P) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write the photo bytes for `id` and return the reference the ledger
    /// stores. One attachment per report; a second save for the same id
    /// overwrites the first.
    pub fn save(&self, id: u64, bytes: &[u8]) -> Result<String> {
        let path = self.root.join(format!("laporan_{id}.jpg"));
        fs::write(&path, bytes).map_err(|source| BotError::Attachment { id, source })?;
        tracing::debug!(
            "AttachmentStore: saved {} byte(s) to {}",
            bytes.len(),
            path.display()
        );
        Ok(path.to_string_lossy().into_owned())
    }

    /// Read back a previously stored photo.
    pub fn retrieve(&self, attachment_ref: &str) -> Result<Vec<u8>> {
        fs::read(attachment_ref)
            .map_err(|_| BotError::AttachmentMissing(attachment_ref.to_string()))
    }
}

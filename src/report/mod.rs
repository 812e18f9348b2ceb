//! Report Domain
//!
//! One `Report` per submitted complaint. The `Ledger` is the append-only
//! store of reports plus the next-id counter, snapshotted to a JSON file;
//! the `AttachmentStore` keeps report photos on disk next to it.

mod attachments;
mod ledger;

pub use attachments::AttachmentStore;
pub use ledger::Ledger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verification status of a report.
///
/// Only `AwaitingVerification` is ever assigned by the bot; the later
/// states are set manually by department staff editing the snapshot, so
/// the enum exists mainly to keep such edits loadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "Menunggu verifikasi")]
    AwaitingVerification,
    #[serde(rename = "Sedang diproses")]
    InProgress,
    #[serde(rename = "Selesai")]
    Resolved,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportStatus::AwaitingVerification => "Menunggu verifikasi",
            ReportStatus::InProgress => "Sedang diproses",
            ReportStatus::Resolved => "Selesai",
        };
        f.write_str(s)
    }
}

/// One user-submitted complaint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Positive, unique, assigned sequentially starting at 1.
    pub id: u64,
    /// Messaging address of the reporting party.
    pub sender: String,
    /// Free text of the report, or the photo-only placeholder.
    pub content: String,
    /// Path of the stored photo, if one was sent.
    #[serde(rename = "attachmentRef", skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    pub status: ReportStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

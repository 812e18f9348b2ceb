//! Report Ledger
//!
//! Append-only store of reports plus the next-id counter. The whole ledger
//! is rewritten to a JSON snapshot after every append. A missing or
//! malformed snapshot at load time resets to an empty ledger — first run
//! and corruption are deliberately indistinguishable.

use super::{Report, ReportStatus};
use crate::error::{BotError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot document written to disk: the ordered report sequence plus the
/// next-id counter.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    reports: Vec<Report>,
    counter: u64,
}

/// The append-only report ledger.
///
/// Not internally synchronized — callers that handle events concurrently
/// must wrap it in a lock so id assignment stays strictly increasing.
#[derive(Debug)]
pub struct Ledger {
    reports: Vec<Report>,
    next_id: u64,
    path: PathBuf,
}

impl Ledger {
    /// Load the ledger from `path`.
    ///
    /// Missing or malformed snapshots yield an empty ledger with the
    /// counter at 1. A snapshot is accepted verbatim even when its counter
    /// does not equal `max(id) + 1`.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Snapshot>(&contents) {
                Ok(snapshot) => {
                    tracing::debug!(
                        "Ledger: loaded {} report(s), counter={}",
                        snapshot.reports.len(),
                        snapshot.counter
                    );
                    Self {
                        reports: snapshot.reports,
                        next_id: snapshot.counter,
                        path,
                    }
                }
                Err(e) => {
                    tracing::warn!("Ledger: malformed snapshot, starting empty: {}", e);
                    Self::empty(path)
                }
            },
            Err(e) => {
                tracing::debug!("Ledger: no snapshot ({}), starting empty", e);
                Self::empty(path)
            }
        }
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            reports: Vec::new(),
            next_id: 1,
            path,
        }
    }

    /// The id the next `append` will assign.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Append a new report and flush the full snapshot.
    ///
    /// On flush failure the in-memory append is NOT rolled back; memory and
    /// disk diverge until the next successful flush.
    pub fn append(
        &mut self,
        sender: &str,
        content: &str,
        attachment_ref: Option<String>,
    ) -> Result<Report> {
        let report = Report {
            id: self.next_id,
            sender: sender.to_string(),
            content: content.to_string(),
            attachment_ref,
            status: ReportStatus::AwaitingVerification,
            created_at: Utc::now(),
        };
        self.next_id += 1;
        self.reports.push(report.clone());
        self.flush()?;
        tracing::info!("Ledger: recorded report #{} from {}", report.id, sender);
        Ok(report)
    }

    /// Linear scan for the report with the given id.
    pub fn find(&self, id: u64) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// Rewrite the whole snapshot. Plain overwrite — a crash mid-write can
    /// corrupt the file, which the load path treats as first run.
    fn flush(&self) -> Result<()> {
        let snapshot = Snapshot {
            reports: self.reports.clone(),
            counter: self.next_id,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| BotError::Persistence {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, json).map_err(|source| BotError::Persistence {
            path: self.path.clone(),
            source,
        })
    }
}

//! WhatsApp socket channel
//!
//! Self-hosted deployment variant: a direct multi-device socket
//! connection paired by QR code, with reports kept in the local JSON
//! ledger and photos in the uploads directory.

pub mod agent;
pub mod fs_store;
mod handler;

use std::sync::Arc;

pub use agent::SocketAgent;
pub use fs_store::FsStore;

use crate::bot::handler::ReportBot;
use crate::config::StorageConfig;

/// Wire up the socket channel and run until logged out.
pub async fn run(storage: &StorageConfig) -> anyhow::Result<()> {
    let report_bot = ReportBot::open(storage)?;
    let agent = SocketAgent::new(Arc::new(report_bot), storage.session_dir.clone());
    agent.run().await
}

//! WhatsApp Business Cloud API channel
//!
//! Hosted deployment variant: Meta pushes message notifications to our
//! HTTP endpoint, replies go out through the Graph API, and reports
//! land in a Google Sheet instead of the local ledger.

pub mod client;
pub mod handler;
pub mod server;
pub mod sheets;

use std::sync::Arc;

pub use client::CloudApiClient;
pub use handler::SheetsBot;
pub use server::{WebhookState, serve};
pub use sheets::SheetsClient;

use crate::config::WebhookConfig;

/// Wire up the Cloud API channel and serve until shutdown.
pub async fn run(config: &WebhookConfig) -> anyhow::Result<()> {
    let state = WebhookState {
        handler: Arc::new(SheetsBot::new(SheetsClient::new(config))),
        client: Arc::new(CloudApiClient::new(config)),
        verify_token: config.verify_token.clone(),
    };
    serve(config, state).await
}

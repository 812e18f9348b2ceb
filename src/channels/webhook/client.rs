//! WhatsApp Business Cloud API client
//!
//! Outbound sends via graph.facebook.com. Text goes straight to the
//! `/messages` endpoint; images are uploaded to `/media` first and sent by
//! media id.

use crate::config::WebhookConfig;
use crate::error::{BotError, Result};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct CloudApiClient {
    http: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl CloudApiClient {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    /// Send a plain text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "text": { "body": body },
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(BotError::CloudApi(err));
        }
        tracing::debug!("CloudApi: sent text to {}", to);
        Ok(())
    }

    /// Upload image bytes, then send an image message referencing the
    /// returned media id.
    pub async fn send_image(&self, to: &str, bytes: Vec<u8>, caption: &str) -> Result<()> {
        let media_id = self.upload_media(bytes).await?;

        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "image",
            "image": { "id": media_id, "caption": caption },
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(BotError::CloudApi(err));
        }
        tracing::debug!("CloudApi: sent image to {}", to);
        Ok(())
    }

    async fn upload_media(&self, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/{}/media", self.base_url, self.phone_number_id);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("laporan.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .part("file", part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(BotError::CloudApi(err));
        }

        let body: serde_json::Value = resp.json().await?;
        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| BotError::CloudApi("media upload response missing id".into()))
    }
}

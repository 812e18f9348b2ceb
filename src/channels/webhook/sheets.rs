//! Google Sheets report sink
//!
//! Appends one row per report to the `Laporan` sheet via the Sheets REST
//! API. The bearer token is operator-supplied; the service-account JWT
//! exchange is outside this process.

use crate::config::WebhookConfig;
use crate::error::{BotError, Result};
use serde_json::json;

const APPEND_RANGE: &str = "Laporan!A:F";

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    sheet_id: String,
    token: String,
}

impl SheetsClient {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.sheets_api_base.trim_end_matches('/').to_string(),
            sheet_id: config.sheet_id.clone(),
            token: config.sheets_token.clone(),
        }
    }

    /// Append one `[timestamp, ticket, jenis, nama, lokasi, keterangan]` row.
    pub async fn append_report(
        &self,
        timestamp: &str,
        ticket: &str,
        jenis: &str,
        nama: &str,
        lokasi: &str,
        keterangan: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.base_url,
            self.sheet_id,
            urlencoding::encode(APPEND_RANGE)
        );
        let payload = json!({
            "values": [[timestamp, ticket, jenis, nama, lokasi, keterangan]],
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(BotError::Sheets(err));
        }
        tracing::info!("Sheets: appended report {}", ticket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/spreadsheets/sheet-1/values/Laporan%21A%3AF:append",
            )
            .match_query(mockito::Matcher::UrlEncoded(
                "valueInputOption".into(),
                "USER_ENTERED".into(),
            ))
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "values": [[
                    "2025-01-01T00:00:00Z",
                    "DISP-1",
                    "Pohon Tumbang",
                    "Budi",
                    "Jl. A",
                    "pohon roboh"
                ]],
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = SheetsClient::new(&WebhookConfig {
            sheets_api_base: server.url(),
            sheet_id: "sheet-1".into(),
            sheets_token: "tok".into(),
            ..Default::default()
        });
        client
            .append_report(
                "2025-01-01T00:00:00Z",
                "DISP-1",
                "Pohon Tumbang",
                "Budi",
                "Jl. A",
                "pohon roboh",
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_append_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "POST",
                "/spreadsheets/sheet-1/values/Laporan%21A%3AF:append",
            )
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body("permission denied")
            .create_async()
            .await;

        let client = SheetsClient::new(&WebhookConfig {
            sheets_api_base: server.url(),
            sheet_id: "sheet-1".into(),
            sheets_token: "tok".into(),
            ..Default::default()
        });
        let err = client
            .append_report("t", "DISP-1", "Taman", "n", "l", "k")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Sheets(msg) if msg.contains("permission denied")));
    }
}

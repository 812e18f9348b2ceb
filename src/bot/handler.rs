//! Ledger-backed message handler
//!
//! Implements the socket deployment's semantics: menu navigation, report
//! recording with optional photo, and status queries, all against the local
//! JSON ledger and uploads directory.

use super::{classify, reply, Command, InboundMessage, MessageHandler, OutboundMessage};
use crate::config::StorageConfig;
use crate::error::Result;
use crate::report::{AttachmentStore, Ledger};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// The DISPERKIM report bot.
///
/// Ledger access is serialized through a mutex so gateways that deliver
/// events concurrently still hand out strictly increasing unique ids, and
/// the attachment file named from `next_id()` always matches the id the
/// subsequent append assigns.
pub struct ReportBot {
    ledger: Mutex<Ledger>,
    attachments: AttachmentStore,
}

impl ReportBot {
    pub fn new(ledger: Ledger, attachments: AttachmentStore) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            attachments,
        }
    }

    /// Load the ledger and open the uploads directory per config.
    pub fn open(storage: &StorageConfig) -> std::io::Result<Self> {
        let ledger = Ledger::load(&storage.ledger_path);
        let attachments = AttachmentStore::open(&storage.uploads_dir)?;
        Ok(Self::new(ledger, attachments))
    }

    async fn record_report(&self, event: &InboundMessage) -> Result<Vec<OutboundMessage>> {
        let mut ledger = self.ledger.lock().await;

        let id = ledger.next_id();
        let attachment_ref = match &event.image {
            Some(bytes) => Some(self.attachments.save(id, bytes)?),
            None => None,
        };

        let text = event.text.as_deref().unwrap_or("").trim();
        let content = if text.is_empty() {
            reply::PHOTO_ONLY_PLACEHOLDER
        } else {
            text
        };

        let report = ledger.append(&event.sender, content, attachment_ref)?;
        Ok(vec![OutboundMessage::Text(reply::confirmation(report.id))])
    }

    async fn query_status(&self, id: u64) -> Vec<OutboundMessage> {
        let ledger = self.ledger.lock().await;
        match ledger.find(id) {
            Some(report) => {
                let mut replies = vec![OutboundMessage::Text(reply::status(report))];
                if let Some(attachment_ref) = &report.attachment_ref {
                    match self.attachments.retrieve(attachment_ref) {
                        Ok(bytes) => replies.push(OutboundMessage::Image {
                            bytes,
                            caption: reply::photo_caption(id),
                        }),
                        Err(e) => {
                            // Photo gone from disk; the text reply still goes out.
                            tracing::warn!("ReportBot: {}", e);
                        }
                    }
                }
                replies
            }
            None => vec![OutboundMessage::Text(reply::NOT_FOUND.to_string())],
        }
    }
}

#[async_trait]
impl MessageHandler for ReportBot {
    async fn on_message(&self, event: InboundMessage) -> Result<Vec<OutboundMessage>> {
        if event.from_self {
            return Ok(Vec::new());
        }
        if event.text.is_none() && event.image.is_none() {
            return Ok(Vec::new());
        }

        let text = event.text.as_deref().unwrap_or("").trim().to_string();
        let command = classify(&text, event.image.is_some());
        tracing::debug!("ReportBot: {:?} from {}", command, event.sender);

        let replies = match command {
            Command::ShowMainMenu => vec![OutboundMessage::Text(reply::MAIN_MENU.to_string())],
            Command::ShowSubmenu(super::ReportKind::FallenTree) => {
                vec![OutboundMessage::Text(reply::TREE_REPORT_FORMAT.to_string())]
            }
            Command::ShowSubmenu(super::ReportKind::CityPark) => {
                vec![OutboundMessage::Text(reply::PARK_REPORT_FORMAT.to_string())]
            }
            Command::ShowInfo => vec![OutboundMessage::Text(reply::INFO.to_string())],
            Command::RecordReport => self.record_report(&event).await?,
            Command::QueryStatus(id) => self.query_status(id).await,
            Command::Unrecognized => vec![OutboundMessage::Text(reply::FALLBACK.to_string())],
        };
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bot_in(dir: &TempDir) -> ReportBot {
        let storage = StorageConfig {
            ledger_path: dir.path().join("laporan.json"),
            uploads_dir: dir.path().join("uploads"),
            session_dir: dir.path().join("session"),
        };
        ReportBot::open(&storage).unwrap()
    }

    fn text_event(sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            sender: sender.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn first_text(replies: &[OutboundMessage]) -> &str {
        match &replies[0] {
            OutboundMessage::Text(t) => t,
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_menu_scenario() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);

        let replies = bot.on_message(text_event("u", "menu")).await.unwrap();
        assert_eq!(first_text(&replies), reply::MAIN_MENU);

        let replies = bot.on_message(text_event("u", "1")).await.unwrap();
        assert_eq!(first_text(&replies), reply::TREE_REPORT_FORMAT);
    }

    #[tokio::test]
    async fn test_report_then_status_scenario() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);

        let replies = bot
            .on_message(text_event(
                "628@s.whatsapp.net",
                "LOKASI: Jl. A\nWAKTU: 10:00\nKONTAK: 0811",
            ))
            .await
            .unwrap();
        assert!(first_text(&replies).contains("#1"));

        let replies = bot.on_message(text_event("u", "cek #1")).await.unwrap();
        assert_eq!(replies.len(), 1, "no image payload without attachment");
        let text = first_text(&replies);
        assert!(text.contains("LOKASI: Jl. A"));
        assert!(text.contains("Menunggu verifikasi"));

        let replies = bot.on_message(text_event("u", "cek #99")).await.unwrap();
        assert_eq!(first_text(&replies), reply::NOT_FOUND);

        let replies = bot.on_message(text_event("u", "asdf")).await.unwrap();
        assert_eq!(first_text(&replies), reply::FALLBACK);
    }

    #[tokio::test]
    async fn test_photo_report_roundtrip() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);

        let event = InboundMessage {
            sender: "628@s.whatsapp.net".into(),
            text: None,
            image: Some(b"jpeg".to_vec()),
            ..Default::default()
        };
        let replies = bot.on_message(event).await.unwrap();
        assert!(first_text(&replies).contains("#1"));

        let replies = bot.on_message(text_event("u", "cek #1")).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert!(first_text(&replies).contains(reply::PHOTO_ONLY_PLACEHOLDER));
        match &replies[1] {
            OutboundMessage::Image { bytes, caption } => {
                assert_eq!(bytes, b"jpeg");
                assert_eq!(caption, "Foto laporan #1");
            }
            other => panic!("expected image reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_messages_ignored() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);

        let event = InboundMessage {
            sender: "me".into(),
            text: Some("menu".into()),
            from_self: true,
            ..Default::default()
        };
        assert!(bot.on_message(event).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_event_ignored() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);
        let replies = bot
            .on_message(InboundMessage {
                sender: "u".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_ids_across_messages() {
        let dir = TempDir::new().unwrap();
        let bot = bot_in(&dir);

        for expected in 1..=3u64 {
            let replies = bot
                .on_message(text_event("u", "LOKASI: somewhere"))
                .await
                .unwrap();
            assert!(first_text(&replies).contains(&format!("#{expected}")));
        }
    }
}

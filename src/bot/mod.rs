//! Bot Core
//!
//! Transport-independent message handling: gateways (socket client, Cloud
//! API webhook) turn their payloads into an `InboundMessage`, hand it to a
//! `MessageHandler`, and dispatch the returned actions back over the wire.

pub mod handler;
pub mod reply;
pub mod router;

pub use handler::ReportBot;
pub use router::{classify, Command, ReportKind};

use crate::error::Result;
use async_trait::async_trait;

/// One received message, normalized across transports.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Messaging address of the sender (JID or phone number).
    pub sender: String,
    /// Message text, absent for attachment-only messages.
    pub text: Option<String>,
    /// Raw photo bytes when the message carried an image.
    pub image: Option<Vec<u8>>,
    /// True when the message originated from the bot's own account.
    pub from_self: bool,
    /// Cloud API quoted-message id, used by the spreadsheet variant to
    /// derive the report type. Socket gateway leaves this unset.
    pub context_id: Option<String>,
}

/// One reply the gateway must deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Image { bytes: Vec<u8>, caption: String },
}

/// Single entry point both gateways drive.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Classify and act on one inbound message, returning the replies to
    /// send. An empty list means the message is ignored.
    async fn on_message(&self, event: InboundMessage) -> Result<Vec<OutboundMessage>>;
}

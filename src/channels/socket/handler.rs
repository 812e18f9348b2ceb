//! Socket message plumbing
//!
//! Unwraps incoming WhatsApp protobuf messages, feeds them to the
//! report handler, and sends the replies back over the same socket.

use std::sync::Arc;

use wacore::types::message::MessageInfo;
use waproto::whatsapp::Message;
use whatsapp_rust::client::Client;

use crate::bot::{InboundMessage, MessageHandler, OutboundMessage};

/// Unwrap nested message wrappers (device_sent, ephemeral, view_once, etc.)
/// Returns the innermost Message that contains actual content.
fn unwrap_message(msg: &Message) -> &Message {
    if let Some(ref dsm) = msg.device_sent_message
        && let Some(ref inner) = dsm.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref eph) = msg.ephemeral_message
        && let Some(ref inner) = eph.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref vo) = msg.view_once_message
        && let Some(ref inner) = vo.message
    {
        return unwrap_message(inner);
    }
    if let Some(ref dwc) = msg.document_with_caption_message
        && let Some(ref inner) = dwc.message
    {
        return unwrap_message(inner);
    }
    msg
}

/// Extract plain text from a WhatsApp message.
fn extract_text(msg: &Message) -> Option<String> {
    let msg = unwrap_message(msg);
    if let Some(ref conv) = msg.conversation
        && !conv.is_empty()
    {
        return Some(conv.clone());
    }
    if let Some(ref ext) = msg.extended_text_message
        && let Some(ref text) = ext.text
    {
        return Some(text.clone());
    }
    // Image caption doubles as the report text
    if let Some(ref img) = msg.image_message
        && let Some(ref caption) = img.caption
        && !caption.is_empty()
    {
        return Some(caption.clone());
    }
    None
}

fn has_image(msg: &Message) -> bool {
    unwrap_message(msg).image_message.is_some()
}

/// Download the attached image. Returns raw bytes on success.
async fn download_image(msg: &Message, client: &Client) -> Option<Vec<u8>> {
    let msg = unwrap_message(msg);
    let img = msg.image_message.as_ref()?;
    match client.download(img.as_ref()).await {
        Ok(bytes) => {
            tracing::debug!("Downloaded image attachment ({} bytes)", bytes.len());
            Some(bytes)
        }
        Err(e) => {
            tracing::error!("Failed to download image attachment: {e}");
            None
        }
    }
}

async fn send_text(client: &Client, info: &MessageInfo, text: String) {
    let reply = waproto::whatsapp::Message {
        conversation: Some(text),
        ..Default::default()
    };
    if let Err(e) = client.send_message(info.source.sender.clone(), reply).await {
        tracing::error!("Failed to send reply: {e}");
    }
}

pub(crate) async fn handle_message(
    msg: Message,
    info: MessageInfo,
    client: Arc<Client>,
    handler: Arc<dyn MessageHandler>,
) {
    let sender = info.source.sender.to_string();
    tracing::debug!(
        "Socket message: from={}, is_from_me={}, has_text={}, has_image={}",
        sender,
        info.source.is_from_me,
        extract_text(&msg).is_some(),
        has_image(&msg),
    );

    let image = if has_image(&msg) {
        download_image(&msg, &client).await
    } else {
        None
    };

    let event = InboundMessage {
        sender,
        text: extract_text(&msg),
        image,
        from_self: info.source.is_from_me,
        context_id: None,
    };

    let replies = match handler.on_message(event).await {
        Ok(replies) => replies,
        Err(e) => {
            tracing::error!("Report handler error: {e}");
            return;
        }
    };

    for reply in replies {
        match reply {
            OutboundMessage::Text(text) => send_text(&client, &info, text).await,
            OutboundMessage::Image { caption, .. } => {
                // Media uploads are not supported on this transport yet;
                // the caption alone still points the operator at the file.
                tracing::warn!(
                    "Image reply downgraded to caption text for {}",
                    info.source.sender
                );
                send_text(&client, &info, caption).await;
            }
        }
    }
}

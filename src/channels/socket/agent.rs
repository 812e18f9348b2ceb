//! Socket agent
//!
//! Owns the whatsapp-rust bot lifecycle: opens the session store, pairs
//! via a terminal QR code on first run, reconnects silently afterwards,
//! and feeds every incoming message to the report handler.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qrcode::QrCode;
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use super::fs_store::FsStore;
use super::handler;
use crate::bot::MessageHandler;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Render a QR code as pure Unicode block characters (no ANSI escapes).
/// Uses upper/lower half blocks to pack two rows per line.
/// Includes a 4-module quiet zone (white border) required for scanning.
fn render_qr_unicode(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    let matrix = code.to_colors();
    let w = code.width();
    let quiet = 4;
    let total = w + quiet * 2;
    let mut out = String::new();

    let color_at = |x: usize, y: usize| -> qrcode::Color {
        if x < quiet || x >= quiet + w || y < quiet || y >= quiet + w {
            qrcode::Color::Light
        } else {
            matrix[(y - quiet) * w + (x - quiet)]
        }
    };

    let mut y = 0;
    while y < total {
        for x in 0..total {
            let top = color_at(x, y);
            let bot = if y + 1 < total {
                color_at(x, y + 1)
            } else {
                qrcode::Color::Light
            };
            let ch = match (top, bot) {
                (qrcode::Color::Light, qrcode::Color::Light) => ' ',
                (qrcode::Color::Dark, qrcode::Color::Dark) => '\u{2588}',
                (qrcode::Color::Dark, qrcode::Color::Light) => '\u{2580}',
                (qrcode::Color::Light, qrcode::Color::Dark) => '\u{2584}',
            };
            out.push(ch);
        }
        out.push('\n');
        y += 2;
    }
    Some(out)
}

pub struct SocketAgent {
    handler: Arc<dyn MessageHandler>,
    session_dir: PathBuf,
}

impl SocketAgent {
    pub fn new(handler: Arc<dyn MessageHandler>, session_dir: PathBuf) -> Self {
        Self {
            handler,
            session_dir,
        }
    }

    /// Run the socket connection until logged out.
    ///
    /// On first run the pairing QR code is printed to the terminal. A
    /// dropped connection is retried after a short delay; a logout from
    /// the phone ends the loop, since the session credentials are no
    /// longer valid.
    pub async fn run(self) -> anyhow::Result<()> {
        let logged_out = Arc::new(AtomicBool::new(false));

        loop {
            let backend = Arc::new(FsStore::open(&self.session_dir)?);
            if backend.device_exists_on_disk() {
                tracing::info!("Paired session found, reconnecting");
            } else {
                tracing::info!("No paired session, a QR code will be shown for pairing");
            }

            let handler = self.handler.clone();
            let logged_out_flag = logged_out.clone();

            let mut bot = Bot::builder()
                .with_backend(backend)
                .with_transport_factory(TokioWebSocketTransportFactory::new())
                .with_http_client(UreqHttpClient::new())
                .on_event(move |event, client| {
                    let handler = handler.clone();
                    let logged_out_flag = logged_out_flag.clone();
                    async move {
                        match event {
                            Event::PairingQrCode { ref code, .. } => {
                                match render_qr_unicode(code) {
                                    Some(qr) => {
                                        println!("Scan this QR code with WhatsApp on your phone:\n\n{qr}");
                                    }
                                    None => {
                                        tracing::warn!("Couldn't render QR code, raw value: {code}");
                                    }
                                }
                            }
                            Event::Connected(_) => {
                                tracing::info!("Connected to WhatsApp");
                            }
                            Event::PairSuccess(_) => {
                                tracing::info!("Pairing successful");
                            }
                            Event::Message(msg, info) => {
                                handler::handle_message(*msg, info, client, handler).await;
                            }
                            Event::LoggedOut(_) => {
                                tracing::warn!("Logged out from the phone");
                                logged_out_flag.store(true, Ordering::SeqCst);
                            }
                            Event::Disconnected(_) => {
                                tracing::warn!("Disconnected");
                            }
                            other => {
                                tracing::debug!("Unhandled event: {:?}", other);
                            }
                        }
                    }
                })
                .build()
                .await
                .map_err(|e| anyhow::anyhow!("failed to build WhatsApp client: {e}"))?;

            match bot.run().await {
                Ok(handle) => {
                    if let Err(e) = handle.await {
                        tracing::error!("Socket task error: {:?}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Socket connection error: {e}");
                }
            }

            if logged_out.load(Ordering::SeqCst) {
                tracing::warn!(
                    "Session logged out. Delete {} to pair again.",
                    self.session_dir.display()
                );
                return Ok(());
            }

            tracing::info!("Connection lost, retrying in {:?}", RECONNECT_DELAY);
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}

//! Channel Integrations
//!
//! The two WhatsApp transports: the multi-device socket client (QR pairing,
//! local ledger) and the Business Cloud API webhook (remote spreadsheet).
//! Both drive a [`crate::bot::MessageHandler`].

#[cfg(feature = "socket")]
pub mod socket;
#[cfg(feature = "webhook")]
pub mod webhook;

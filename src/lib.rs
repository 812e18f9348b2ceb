//! DISPERKIM Kota Semarang WhatsApp report bot
//!
//! Citizens report fallen trees and damaged city parks over WhatsApp; the
//! bot walks them through a menu, records each report with a trackable
//! number, and answers status queries.
//!
//! Two interchangeable channels cover the two deployment modes:
//!
//! - **socket** — a direct multi-device socket connection paired by QR
//!   code. Reports land in a local JSON ledger, photos in an uploads
//!   directory.
//! - **webhook** — the WhatsApp Business Cloud API. Meta pushes messages
//!   to our HTTP endpoint and reports are appended to a Google Sheet.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run whichever channels the config enables
//! disperkim-bot
//!
//! # Force a single channel
//! disperkim-bot socket
//! disperkim-bot webhook
//! ```

pub mod bot;
pub mod channels;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;

// Re-export commonly used types
pub use error::{BotError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Telegram webhook bridge.
//!
//! This library provides shared modules for the two bridge binaries:
//! - `tgbridge-web`: Thin web server receiving Telegram webhook calls
//! - `tgbridge-processor`: Consumer draining the queue of raw updates
//!
//! ## Architecture
//!
//! ```text
//! Telegram → Web Server → telegram_updates → Processor
//! ```

pub mod config;
pub mod error;
pub mod process;
pub mod queue;
pub mod secrets;
pub mod web;

// Re-export commonly used types
pub use config::{Config, Stage};
pub use error::AppError;
pub use process::{handle_batch, handle_message, UpdateKind};
pub use queue::{Publisher, QueuedMessage, UpdateSink, TELEGRAM_QUEUE};
pub use secrets::{HttpSecretStore, SecretProvider, SecretStore};
pub use web::AppState;

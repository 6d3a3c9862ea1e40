//! Web server module for handling inbound webhooks.
//!
//! This module provides a thin, fast web server that:
//! - Receives webhook calls from the Telegram Bot API
//! - Verifies the shared-secret header
//! - Immediately enqueues raw payloads to RabbitMQ
//! - Returns 200 OK in microseconds
//!
//! All parsing and processing happens in the background processor.

pub mod auth;
pub mod handlers;

pub use auth::{validate_token, ValidationError};
pub use handlers::{health, telegram_webhook, AckResponse, AppState, HealthResponse};

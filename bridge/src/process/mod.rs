//! Queued update processing.
//!
//! The processor drains raw Telegram payloads from the telegram_updates
//! queue. Each message is parsed and classified independently; one message
//! failing never prevents the rest of a batch from being attempted, and the
//! failed identifiers are reported back so the queue can redeliver only those.
//!
//! ## Processing Flow
//!
//! ```text
//! QueuedMessage → handle_message() → UpdateKind
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::queue::QueuedMessage;

/// Minimal view of a Telegram update, just enough to classify it.
///
/// Every field is optional: Telegram sends exactly one update payload per
/// call, and unknown shapes still have to be accepted.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub edited_message: Option<Value>,
    #[serde(default)]
    pub callback_query: Option<Value>,
    #[serde(default)]
    pub inline_query: Option<Value>,
}

/// The kind of Telegram update, used for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    CallbackQuery,
    InlineQuery,
    Unknown,
}

impl UpdateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateKind::Message => "message",
            UpdateKind::EditedMessage => "edited_message",
            UpdateKind::CallbackQuery => "callback_query",
            UpdateKind::InlineQuery => "inline_query",
            UpdateKind::Unknown => "unknown",
        }
    }
}

/// Per-message processing failure.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("invalid update payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Classify an update by which payload field is present.
pub fn classify_update(update: &TelegramUpdate) -> UpdateKind {
    if update.message.is_some() {
        UpdateKind::Message
    } else if update.edited_message.is_some() {
        UpdateKind::EditedMessage
    } else if update.callback_query.is_some() {
        UpdateKind::CallbackQuery
    } else if update.inline_query.is_some() {
        UpdateKind::InlineQuery
    } else {
        UpdateKind::Unknown
    }
}

/// Handle one queued message.
///
/// Parses the raw body and classifies the update. A payload that parses but
/// lacks expected fields is classified `Unknown` and still counts as handled:
/// redelivery cannot repair its content. Only parse failures are reported as
/// message failures. Per-update business logic is not wired up yet.
pub fn handle_message(message: &QueuedMessage) -> Result<UpdateKind, ProcessError> {
    let update: TelegramUpdate = serde_json::from_str(&message.body)?;
    let kind = classify_update(&update);

    info!(
        message_id = %message.id,
        update_id = ?update.update_id,
        update_kind = kind.as_str(),
        "telegram_update_received"
    );

    Ok(kind)
}

/// Handle a batch of queued messages, returning the failed identifiers.
///
/// Messages are handled independently: a failure is recorded for that message
/// and the loop moves on. The returned identifiers are exactly the messages
/// that individually failed, in delivery order; redelivery of those is the
/// queue's responsibility.
pub fn handle_batch(batch: &[QueuedMessage]) -> Vec<String> {
    info!(message_count = batch.len(), "telegram_batch_received");

    let mut failures = Vec::new();

    for message in batch {
        if let Err(e) = handle_message(message) {
            error!(
                message_id = %message.id,
                error = %e,
                "telegram_message_failed"
            );
            failures.push(message.id.clone());
        }
    }

    info!(
        message_count = batch.len(),
        failure_count = failures.len(),
        "telegram_batch_complete"
    );

    failures
}

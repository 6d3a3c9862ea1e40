//! Queue names and message types.

/// Queue name for raw Telegram webhook payloads.
pub const TELEGRAM_QUEUE: &str = "telegram_updates";

/// A queued message as delivered to the processor.
///
/// `body` is the raw, unmodified payload the webhook caller sent; `id` is the
/// queue-assigned identifier used to mark the message for redelivery.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: String,
    pub body: String,
}

impl QueuedMessage {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

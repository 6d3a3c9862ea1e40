//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The queue name and message types for the bridge
//! - The outbound sink interface and its async publisher
//!
//! ## Architecture
//!
//! ```text
//! Web Server → telegram_updates queue → Processor
//! ```

pub mod publisher;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use publisher::Publisher;
pub use types::{QueuedMessage, TELEGRAM_QUEUE};

/// Outbound interface handing a raw webhook payload to the durable queue.
///
/// The web handler only depends on this trait, so tests can substitute a
/// recording sink for the RabbitMQ publisher.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Submit one payload. Ownership of the message transfers to the queue
    /// once this returns `Ok`.
    async fn submit(&self, body: &str) -> Result<()>;
}

//! Async RabbitMQ publisher for enqueueing raw webhook payloads.
//!
//! The publisher maintains a persistent connection and channel to RabbitMQ,
//! reconnecting lazily on failure, and can be shared across async tasks.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{types::TELEGRAM_QUEUE, UpdateSink};

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        // Check if we have a valid channel
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        // Need to reconnect
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        info!("rabbitmq_publisher_connected");

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        // Declare the queue (idempotent operation)
        ch.queue_declare(
            TELEGRAM_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare telegram queue")?;

        info!(queue = TELEGRAM_QUEUE, "rabbitmq_queue_declared");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish one raw webhook payload to the telegram_updates queue.
    ///
    /// The payload is forwarded byte-for-byte; no parsing happens here.
    pub async fn publish_update(&self, body: &str) -> Result<()> {
        let channel = self.ensure_connected().await?;

        channel
            .basic_publish(
                "",
                TELEGRAM_QUEUE,
                BasicPublishOptions::default(),
                body.as_bytes(),
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into()),
            )
            .await
            .context("Failed to publish to telegram queue")?
            .await
            .context("Failed to confirm publish")?;

        info!(
            queue = TELEGRAM_QUEUE,
            body_length = body.len(),
            "rabbitmq_update_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

#[async_trait]
impl UpdateSink for Publisher {
    async fn submit(&self, body: &str) -> Result<()> {
        self.publish_update(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_surfaces_connect_failure() {
        // Nothing listens on port 1; the connect attempt must fail and the
        // error must reach the caller instead of being swallowed.
        let publisher = Publisher::new("amqp://127.0.0.1:1/%2f".to_string());

        let result = publisher.submit(r#"{"update_id":1}"#).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to connect to RabbitMQ"));
    }
}

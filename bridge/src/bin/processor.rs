//! Bridge Processor - Telegram update consumer.
//!
//! This binary:
//! 1. Consumes raw webhook payloads from the telegram_updates queue
//! 2. Parses and classifies each update independently
//! 3. Acks handled messages; nacks failed ones back for redelivery
//!
//! One message failing never prevents the rest from being attempted; the
//! queue owns retry and dead-lettering of the failed ones.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tgbridge::{handle_message, Config, QueuedMessage, TELEGRAM_QUEUE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("processor_starting");

    // Load configuration; missing required variables abort startup
    let config = Config::from_env().context("Invalid configuration")?;
    info!(concurrency = config.worker_concurrency, "config_loaded");

    // Run the processor
    run(config).await?;

    Ok(())
}

/// Run the processor.
async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    // Connect to RabbitMQ
    info!(url_length = config.cloudamqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.cloudamqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    // Create a channel
    let channel = conn
        .create_channel()
        .await
        .context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    // Set QoS with high prefetch for concurrent processing
    let prefetch_count = prefetch_count(config.worker_concurrency);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    // Declare the queue (durable, matching the publisher)
    channel
        .queue_declare(
            TELEGRAM_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = TELEGRAM_QUEUE, "rabbitmq_queue_declared");

    // Start consuming messages
    let mut consumer = channel
        .basic_consume(
            TELEGRAM_QUEUE,
            "tgbridge-processor",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = TELEGRAM_QUEUE, "rabbitmq_consumer_started");
    info!("processor_ready");

    // Clone channel for use in message handler
    let channel = Arc::new(channel);

    // Create shutdown signal future
    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    // Pin the shutdown future
    tokio::pin!(shutdown);

    // Process messages until shutdown
    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = &mut shutdown => {
                info!("processor_stopping");
                break;
            }
            // Process next message
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;
                        let message_id = delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| delivery_tag.to_string());

                        info!(
                            queue = TELEGRAM_QUEUE,
                            message_id = %message_id,
                            delivery_tag = delivery_tag,
                            body_length = delivery.data.len(),
                            "rabbitmq_update_received"
                        );

                        // Clone resources for the spawned task
                        let channel = Arc::clone(&channel);

                        // Spawn a task to process this message
                        tokio::spawn(async move {
                            let message = QueuedMessage::new(
                                message_id.clone(),
                                String::from_utf8_lossy(&delivery.data).into_owned(),
                            );

                            match handle_message(&message) {
                                Ok(kind) => {
                                    // Acknowledge the message
                                    if let Err(e) = channel
                                        .basic_ack(delivery_tag, BasicAckOptions::default())
                                        .await
                                    {
                                        error!(
                                            delivery_tag = delivery_tag,
                                            error = %e,
                                            "rabbitmq_ack_failed"
                                        );
                                    } else {
                                        info!(
                                            queue = TELEGRAM_QUEUE,
                                            message_id = %message.id,
                                            update_kind = kind.as_str(),
                                            "rabbitmq_update_handled"
                                        );
                                    }
                                }
                                Err(e) => {
                                    error!(
                                        message_id = %message.id,
                                        error = %e,
                                        "telegram_update_failed"
                                    );

                                    // Reject and requeue; redelivery is the
                                    // queue's responsibility
                                    if let Err(nack_err) = channel
                                        .basic_nack(
                                            delivery_tag,
                                            BasicNackOptions {
                                                requeue: true,
                                                ..Default::default()
                                            },
                                        )
                                        .await
                                    {
                                        error!(
                                            delivery_tag = delivery_tag,
                                            error = %nack_err,
                                            "rabbitmq_nack_failed"
                                        );
                                    }
                                }
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    info!("processor_shutdown_complete");
    Ok(())
}

/// Clamp the configured concurrency into the u16 range AMQP QoS accepts.
fn prefetch_count(concurrency: usize) -> u16 {
    u16::try_from(concurrency).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_count_clamps_to_u16() {
        assert_eq!(prefetch_count(100), 100);
        assert_eq!(prefetch_count(65_535), u16::MAX);
        assert_eq!(prefetch_count(70_000), u16::MAX);
    }
}

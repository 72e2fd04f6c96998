//! RabbitMQ channel via lapin
//!
//! One connection per process, built explicitly at startup and shared by
//! reference. The channel is created on first use and recreated when a later
//! call finds it closed (a failed passive declare or publish closes it).
//!
//! Delivery tags belong to the channel that consumed them, so ack and nack
//! go to that channel only and never reopen it.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use shared::message::CORRELATION_HEADER;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::sync::Mutex;

use super::{BrokerError, Delivery, DeliveryStream, QueueChannel};

/// AMQP delivery mode 2 = persistent
const PERSISTENT: u8 = 2;

pub struct AmqpConnection {
    connection: Connection,
    channel: Mutex<Option<Channel>>,
    /// Channel the active consumer was opened on
    consumer: Mutex<Option<Channel>>,
    /// 0 = unlimited
    prefetch: AtomicU16,
}

impl AmqpConnection {
    /// Connect to the broker; failure here is fatal to startup
    pub async fn connect(uri: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        tracing::info!("Connected to AMQP broker");

        let this = Self {
            connection,
            channel: Mutex::new(None),
            consumer: Mutex::new(None),
            prefetch: AtomicU16::new(0),
        };
        this.channel().await?;
        Ok(this)
    }

    /// Current channel, reopened if it was closed
    async fn channel(&self) -> Result<Channel, BrokerError> {
        let mut guard = self.channel.lock().await;
        if let Some(channel) = guard.as_ref()
            && channel.status().connected()
        {
            return Ok(channel.clone());
        }

        if !self.connection.status().connected() {
            return Err(BrokerError::ChannelClosed);
        }

        let channel = self.connection.create_channel().await?;
        let prefetch = self.prefetch.load(Ordering::Relaxed);
        if prefetch > 0 {
            channel
                .basic_qos(prefetch, BasicQosOptions::default())
                .await?;
        }
        if guard.is_some() {
            tracing::warn!(channel_id = channel.id(), "AMQP channel reopened");
        } else {
            tracing::debug!(channel_id = channel.id(), "AMQP channel opened");
        }
        *guard = Some(channel.clone());
        Ok(channel)
    }

    async fn consumer_channel(&self) -> Result<Channel, BrokerError> {
        let guard = self.consumer.lock().await;
        settling_channel(guard.as_ref(), |channel| channel.status().connected())
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }
}

#[async_trait]
impl QueueChannel for AmqpConnection {
    async fn assert_queue(&self, queue: &str) -> Result<u32, BrokerError> {
        let channel = self.channel().await?;
        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(declared.message_count())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.prefetch.store(count, Ordering::Relaxed);
        let channel = self.channel().await?;
        channel.basic_qos(count, BasicQosOptions::default()).await?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        let channel = self.channel().await?;
        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        *self.consumer.lock().await = Some(channel);

        Ok(consumer
            .map(|item| item.map(from_amqp).map_err(BrokerError::from))
            .boxed())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        let channel = self.consumer_channel().await?;
        channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let channel = self.consumer_channel().await?;
        channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await?;
        Ok(())
    }

    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let channel = self.channel().await?;
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn message_count(&self, queue: &str) -> Result<u32, BrokerError> {
        let channel = self.channel().await?;
        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(declared.message_count())
    }
}

/// The consuming channel if it is still open
fn settling_channel<C: Clone>(
    consumer: Option<&C>,
    is_open: impl Fn(&C) -> bool,
) -> Result<C, BrokerError> {
    match consumer {
        Some(channel) if is_open(channel) => Ok(channel.clone()),
        _ => Err(BrokerError::ChannelClosed),
    }
}

fn from_amqp(delivery: lapin::message::Delivery) -> Delivery {
    let correlation_id = delivery
        .properties
        .correlation_id()
        .as_ref()
        .map(|id| id.as_str().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| header_string(delivery.properties.headers(), CORRELATION_HEADER));

    Delivery {
        delivery_tag: delivery.delivery_tag,
        payload: delivery.data,
        correlation_id,
    }
}

fn header_string(headers: &Option<FieldTable>, key: &str) -> Option<String> {
    let (_, value) = headers
        .as_ref()?
        .inner()
        .iter()
        .find(|(name, _)| name.as_str() == key)?;

    let text = match value {
        AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        AMQPValue::ShortString(s) => s.as_str().to_string(),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

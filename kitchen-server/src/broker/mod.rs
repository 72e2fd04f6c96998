//! 消息代理抽象
//!
//! # 模块结构
//!
//! - [`QueueChannel`] - 队列通道 trait（声明、消费、确认、发布）
//! - [`amqp`] - RabbitMQ 实现 (lapin)
//! - [`memory`] - 进程内实现（测试替身）
//! - [`dead_letter`] - 死信转发

pub mod amqp;
pub mod dead_letter;
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use amqp::AmqpConnection;
pub use dead_letter::{DeadLetterForwarder, dead_letter_payload};
pub use memory::{MemoryBroker, MemoryChannel};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),
}

/// One message handed to a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
    /// `correlation_id` property, else the `x-correlation-id` header
    pub correlation_id: Option<String>,
}

/// Stream of deliveries; ends when the consumer is cancelled
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// Queue channel operations used by the ingestion pipeline
#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// Declare a durable queue if it does not exist; returns its ready count
    async fn assert_queue(&self, queue: &str) -> Result<u32, BrokerError>;

    /// Maximum unacknowledged deliveries per consumer
    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str, consumer_tag: &str)
    -> Result<DeliveryStream, BrokerError>;

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;

    /// Publish through the default exchange with persistent delivery mode
    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Ready messages currently in `queue`
    async fn message_count(&self, queue: &str) -> Result<u32, BrokerError>;
}

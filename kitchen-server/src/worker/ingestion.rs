//! Order ingestion worker
//!
//! 消费订单入站队列，逐条处理：
//!
//! ```text
//! received → reconciled → enriched → persisted → notified → acknowledged
//!     └──────────────────────────────→ failed → dead-lettered → nacked
//! ```
//!
//! 同一时刻只有一条消息在处理中 (prefetch = 1)。

use futures::StreamExt;
use shared::message::{DEAD_LETTER_QUEUE, ORDERS_QUEUE};
use shared::order::{KitchenOrder, LiveEvent, OrderItem, OrderMessage, OrderStatus};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::broker::{
    BrokerError, DeadLetterForwarder, Delivery, DeliveryStream, QueueChannel, dead_letter_payload,
};
use crate::catalog::ProductLookup;
use crate::live::LiveHub;
use crate::orders::{OrderStore, StoreError, factory};
use crate::preparation::PreparationCalculator;

const CONSUMER_TAG: &str = "kitchen-worker";
const IDLE_MESSAGE: &str = "🕒 Esperando nuevos pedidos...";

/// Failure of one in-flight message; every variant ends in dead-letter + nack
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Malformed order message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Order store failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Live notification failed: {0}")]
    Notification(serde_json::Error),

    #[error("Acknowledge failed: {0}")]
    Ack(#[from] BrokerError),
}

/// How a delivery was settled
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Stored, announced and acked
    Acked { order_id: String, created: bool },
    /// Routed to the dead-letter queue (when `forwarded`) and nacked without requeue
    DeadLettered { forwarded: bool },
}

/// Per-item enrichment result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEnrichment {
    Estimated { seconds: f64 },
    Unestimated,
}

pub struct IngestionWorker {
    channel: Arc<dyn QueueChannel>,
    dead_letter: DeadLetterForwarder,
    store: Arc<dyn OrderStore>,
    products: Arc<dyn ProductLookup>,
    calculator: Arc<PreparationCalculator>,
    live: LiveHub,
    orders_queue: String,
    dead_letter_queue: String,
    prefetch: u16,
}

impl IngestionWorker {
    /// Worker on `channel`, which also serves as the dead-letter fallback channel
    pub fn new(
        channel: Arc<dyn QueueChannel>,
        store: Arc<dyn OrderStore>,
        products: Arc<dyn ProductLookup>,
        calculator: Arc<PreparationCalculator>,
        live: LiveHub,
    ) -> Self {
        Self {
            dead_letter: DeadLetterForwarder::new(channel.clone()),
            channel,
            store,
            products,
            calculator,
            live,
            orders_queue: ORDERS_QUEUE.to_string(),
            dead_letter_queue: DEAD_LETTER_QUEUE.to_string(),
            prefetch: 1,
        }
    }

    pub fn with_queues(
        mut self,
        orders_queue: impl Into<String>,
        dead_letter_queue: impl Into<String>,
    ) -> Self {
        self.orders_queue = orders_queue.into();
        self.dead_letter_queue = dead_letter_queue.into();
        self
    }

    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Use a separate long-lived channel for the dead-letter retry
    pub fn with_dead_letter_fallback(mut self, fallback: Arc<dyn QueueChannel>) -> Self {
        self.dead_letter = DeadLetterForwarder::new(fallback);
        self
    }

    /// 声明队列、设置 prefetch 并注册消费者
    ///
    /// 任一步失败即返回错误，调用方不应进入消费循环。
    pub async fn start(&self) -> Result<DeliveryStream, BrokerError> {
        self.channel.assert_queue(&self.orders_queue).await?;
        self.channel.set_prefetch(self.prefetch).await?;
        let deliveries = self.channel.consume(&self.orders_queue, CONSUMER_TAG).await?;

        tracing::info!(
            queue = %self.orders_queue,
            prefetch = self.prefetch,
            strategies = self.calculator.len(),
            "📥 Kitchen worker listening for orders"
        );
        Ok(deliveries)
    }

    /// 运行工作者（直到取消或消费者结束）
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        let deliveries = self.start().await?;
        self.consume(deliveries, shutdown).await;
        Ok(())
    }

    /// 逐条处理投递；取消只在两条消息之间生效
    pub async fn consume(self, mut deliveries: DeliveryStream, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Kitchen worker received shutdown signal");
                    break;
                }
                next = deliveries.next() => {
                    match next {
                        Some(Ok(delivery)) => {
                            self.handle_delivery(delivery).await;
                        }
                        Some(Err(e)) => {
                            tracing::error!(queue = %self.orders_queue, error = %e, "Delivery error");
                        }
                        // Consumer cancelled: nothing to settle
                        None => {
                            tracing::info!(queue = %self.orders_queue, "Consumer cancelled, kitchen worker stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Process one delivery to a terminal state (acked, or dead-lettered and nacked)
    pub async fn handle_delivery(&self, delivery: Delivery) -> Outcome {
        let span = tracing::info_span!(
            "order_message",
            delivery_tag = delivery.delivery_tag,
            correlation_id = delivery.correlation_id.as_deref().unwrap_or("-"),
        );

        async {
            match self.process(&delivery).await {
                Ok((order_id, created)) => {
                    self.signal_if_idle().await;
                    Outcome::Acked { order_id, created }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Order message failed, routing to dead-letter queue");
                    self.fail(&delivery).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, delivery: &Delivery) -> Result<(String, bool), ProcessError> {
        let message: OrderMessage = serde_json::from_slice(&delivery.payload)?;

        let existing = match message.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self.store.get_by_id(id).await?,
            None => None,
        };

        let created = existing.is_none();
        let order = match existing {
            Some(current) => {
                let mut order = factory::from_message_with_status(message, current.status);
                // createdAt is fixed at first sighting
                order.created_at = current.created_at;
                self.enrich(&mut order.items).await;
                self.store.remove(&order.id).await?;
                self.store.create(&order).await?;
                tracing::info!(order_id = %order.id, status = %order.status, "Order updated");
                self.announce(LiveEvent::OrderUpdated { order: order.clone() })?;
                order
            }
            None => {
                let mut order = factory::from_message_with_status(message, OrderStatus::Pending);
                self.enrich(&mut order.items).await;
                self.store.create(&order).await?;
                tracing::info!(
                    order_id = %order.id,
                    table = %order.table,
                    items = order.items.len(),
                    "🍽️ New kitchen order"
                );
                self.announce(LiveEvent::OrderNew { order: order.clone() })?;
                order
            }
        };

        tracing::info!(
            order_id = %order.id,
            estimated_seconds = self.estimate(&order),
            "⏱️ Preparation estimate"
        );

        self.channel.ack(delivery.delivery_tag).await?;
        Ok((order.id, created))
    }

    fn announce(&self, event: LiveEvent) -> Result<(), ProcessError> {
        self.live
            .notify_clients(&event)
            .map(|_| ())
            .map_err(ProcessError::Notification)
    }

    fn estimate(&self, order: &KitchenOrder) -> f64 {
        order
            .items
            .iter()
            .map(|item| self.calculator.calculate(&item.product_name, item.quantity))
            .sum()
    }

    async fn enrich(&self, items: &mut [OrderItem]) {
        for item in items.iter_mut() {
            if let ItemEnrichment::Estimated { seconds } = self.enrich_item(item).await {
                item.preparation_time_seconds = Some(seconds);
            }
        }
    }

    /// Look up the product; lookup errors leave the item without an estimate
    pub async fn enrich_item(&self, item: &OrderItem) -> ItemEnrichment {
        match self.products.get_by_name(&item.product_name).await {
            Ok(Some(product)) => match product.preparation_seconds() {
                Some(seconds) => ItemEnrichment::Estimated { seconds },
                None => ItemEnrichment::Unestimated,
            },
            Ok(None) => ItemEnrichment::Unestimated,
            Err(e) => {
                tracing::warn!(
                    product = %item.product_name,
                    error = %e,
                    "Product lookup failed, item left without estimate"
                );
                ItemEnrichment::Unestimated
            }
        }
    }

    async fn signal_if_idle(&self) {
        match self.channel.message_count(&self.orders_queue).await {
            Ok(0) => {
                let idle = LiveEvent::QueueEmpty {
                    message: IDLE_MESSAGE.to_string(),
                };
                if let Err(e) = self.live.notify_clients(&idle) {
                    tracing::warn!(error = %e, "Failed to announce idle queue");
                }
                tracing::info!(queue = %self.orders_queue, "{}", IDLE_MESSAGE);
            }
            Ok(remaining) => {
                tracing::debug!(queue = %self.orders_queue, remaining, "Orders waiting");
            }
            Err(e) => {
                tracing::warn!(queue = %self.orders_queue, error = %e, "Queue depth check failed");
            }
        }
    }

    async fn fail(&self, delivery: &Delivery) -> Outcome {
        let payload = dead_letter_payload(&delivery.payload, delivery.correlation_id.as_deref());

        let forwarded = match self
            .dead_letter
            .send_to_dlq(self.channel.as_ref(), &self.dead_letter_queue, &payload)
            .await
        {
            Ok(()) => {
                tracing::info!(queue = %self.dead_letter_queue, "Message dead-lettered");
                true
            }
            Err(e) => {
                tracing::error!(queue = %self.dead_letter_queue, error = %e, "Dead-letter forwarding failed");
                false
            }
        };

        if let Err(e) = self.channel.nack(delivery.delivery_tag, false).await {
            tracing::error!(error = %e, "Nack failed");
        }

        Outcome::DeadLettered { forwarded }
    }
}

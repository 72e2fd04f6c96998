//! In-process broker
//!
//! Mirrors the parts of AMQP the pipeline depends on: durable named queues,
//! per-channel prefetch credit, explicit ack/nack, ready-message counts and
//! consumer cancellation. Test double for the AMQP channel.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use super::{BrokerError, Delivery, DeliveryStream, QueueChannel};

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    correlation_id: Option<String>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<StoredMessage>>,
}

/// Shared queue storage; hand out [`MemoryChannel`]s with [`MemoryBroker::channel`]
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    changed: Arc<Notify>,
    next_channel: Arc<AtomicU64>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> MemoryChannel {
        let id = self.next_channel.fetch_add(1, Ordering::Relaxed) + 1;
        MemoryChannel {
            id,
            broker: self.clone(),
            state: Arc::new(Mutex::new(ChannelState::default())),
        }
    }

    /// Producer side: declare `queue` if needed and append a message
    pub fn publish(
        &self,
        queue: &str,
        payload: impl Into<Vec<u8>>,
        correlation_id: Option<&str>,
    ) {
        self.lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(StoredMessage {
                payload: payload.into(),
                correlation_id: correlation_id.map(String::from),
            });
        self.changed.notify_waiters();
    }

    /// Payloads of the ready messages in `queue`, head first
    pub fn messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Default)]
struct ChannelState {
    prefetch: u16,
    next_tag: u64,
    unacked: HashMap<u64, (String, StoredMessage)>,
    cancelled: HashSet<String>,
    acked: Vec<u64>,
    nacked: Vec<(u64, bool)>,
    fail_publish: bool,
    fail_ack: bool,
}

enum Take {
    Ready(Delivery),
    Wait,
    Cancelled,
}

/// Channel over a [`MemoryBroker`]; delivery tags are scoped to the channel
#[derive(Clone)]
pub struct MemoryChannel {
    id: u64,
    broker: MemoryBroker,
    state: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// End every stream consuming under `consumer_tag`
    pub fn cancel(&self, consumer_tag: &str) {
        self.lock().cancelled.insert(consumer_tag.to_string());
        self.broker.changed.notify_waiters();
    }

    /// Make every publish on this channel fail
    pub fn set_fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Make every ack on this channel fail, leaving the delivery unsettled
    pub fn set_fail_ack(&self, fail: bool) {
        self.lock().fail_ack = fail;
    }

    pub fn acked(&self) -> Vec<u64> {
        self.lock().acked.clone()
    }

    /// `(delivery_tag, requeue)` in call order
    pub fn nacked(&self) -> Vec<(u64, bool)> {
        self.lock().nacked.clone()
    }

    pub fn unacked_count(&self) -> usize {
        self.lock().unacked.len()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_take(&self, queue: &str, consumer_tag: &str) -> Take {
        let mut channel = self.lock();
        if channel.cancelled.contains(consumer_tag) {
            return Take::Cancelled;
        }
        if channel.prefetch > 0 && channel.unacked.len() >= channel.prefetch as usize {
            return Take::Wait;
        }

        let mut broker = self.broker.lock();
        let Some(message) = broker.queues.get_mut(queue).and_then(|q| q.pop_front()) else {
            return Take::Wait;
        };

        channel.next_tag += 1;
        let delivery_tag = channel.next_tag;
        let delivery = Delivery {
            delivery_tag,
            payload: message.payload.clone(),
            correlation_id: message.correlation_id.clone(),
        };
        channel
            .unacked
            .insert(delivery_tag, (queue.to_string(), message));
        Take::Ready(delivery)
    }

    fn settle(&self, delivery_tag: u64) -> Result<(String, StoredMessage), BrokerError> {
        self.lock()
            .unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery_tag))
    }
}

#[async_trait]
impl QueueChannel for MemoryChannel {
    async fn assert_queue(&self, queue: &str) -> Result<u32, BrokerError> {
        let mut broker = self.broker.lock();
        let ready = broker.queues.entry(queue.to_string()).or_default().len();
        Ok(ready as u32)
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.lock().prefetch = count;
        self.broker.changed.notify_waiters();
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        if !self.broker.queue_exists(queue) {
            return Err(BrokerError::QueueNotFound(queue.to_string()));
        }

        let channel = self.clone();
        let queue = queue.to_string();
        let consumer_tag = consumer_tag.to_string();

        let stream = futures::stream::unfold(
            (channel, queue, consumer_tag),
            |(channel, queue, consumer_tag)| async move {
                loop {
                    let changed = channel.broker.changed.clone();
                    let notified = changed.notified();
                    tokio::pin!(notified);
                    // Register interest before checking so a concurrent publish is not missed
                    notified.as_mut().enable();

                    match channel.try_take(&queue, &consumer_tag) {
                        Take::Ready(delivery) => {
                            return Some((Ok(delivery), (channel, queue, consumer_tag)));
                        }
                        Take::Cancelled => return None,
                        Take::Wait => notified.await,
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        if self.lock().fail_ack {
            return Err(BrokerError::ChannelClosed);
        }
        self.settle(delivery_tag)?;
        self.lock().acked.push(delivery_tag);
        self.broker.changed.notify_waiters();
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let (queue, message) = self.settle(delivery_tag)?;
        self.lock().nacked.push((delivery_tag, requeue));
        if requeue {
            self.broker
                .lock()
                .queues
                .entry(queue)
                .or_default()
                .push_front(message);
        }
        self.broker.changed.notify_waiters();
        Ok(())
    }

    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.lock().fail_publish {
            return Err(BrokerError::Publish(format!(
                "channel {} rejected publish to {}",
                self.id, queue
            )));
        }

        let mut broker = self.broker.lock();
        match broker.queues.get_mut(queue) {
            Some(q) => q.push_back(StoredMessage {
                payload: payload.to_vec(),
                correlation_id: None,
            }),
            // Default exchange drops unroutable messages
            None => tracing::debug!(queue = %queue, "Dropping publish to undeclared queue"),
        }
        drop(broker);
        self.broker.changed.notify_waiters();
        Ok(())
    }

    async fn message_count(&self, queue: &str) -> Result<u32, BrokerError> {
        self.broker
            .lock()
            .queues
            .get(queue)
            .map(|q| q.len() as u32)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))
    }
}

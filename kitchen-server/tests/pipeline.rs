use async_trait::async_trait;
use futures::StreamExt;
use kitchen_server::broker::{Delivery, MemoryBroker, MemoryChannel, QueueChannel};
use kitchen_server::catalog::{CatalogError, MenuCatalog, ProductLookup};
use kitchen_server::live::{LiveHub, ViewerConnection};
use kitchen_server::orders::{OrderStore, RedbOrderStore, StoreError, StoreResult};
use kitchen_server::preparation::PreparationCalculator;
use kitchen_server::worker::{IngestionWorker, Outcome};
use serde_json::{Value, json};
use shared::message::{DEAD_LETTER_QUEUE, ORDERS_QUEUE};
use shared::models::Product;
use shared::order::{KitchenOrder, OrderStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingViewer {
    frames: Mutex<Vec<Value>>,
}

impl RecordingViewer {
    fn event_types(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .collect()
    }

    fn events(&self) -> Vec<Value> {
        self.frames.lock().unwrap().clone()
    }
}

impl ViewerConnection for RecordingViewer {
    fn is_open(&self) -> bool {
        true
    }

    fn send_text(&self, text: Arc<str>) -> bool {
        self.frames
            .lock()
            .unwrap()
            .push(serde_json::from_str(&text).unwrap());
        true
    }
}

/// Store whose writes always fail
struct BrokenStore;

#[async_trait]
impl OrderStore for BrokenStore {
    async fn get_by_id(&self, _id: &str) -> StoreResult<Option<KitchenOrder>> {
        Ok(None)
    }

    async fn create(&self, _order: &KitchenOrder) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn remove(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn update_status(&self, _id: &str, _status: OrderStatus) -> StoreResult<bool> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn get_all(&self) -> StoreResult<Vec<KitchenOrder>> {
        Ok(vec![])
    }
}

/// Store that finds every order but cannot replace it
struct ReadOnlyStore;

#[async_trait]
impl OrderStore for ReadOnlyStore {
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<KitchenOrder>> {
        Ok(Some(KitchenOrder {
            id: id.to_string(),
            customer_name: "Juan".into(),
            table: "Mesa 5".into(),
            items: vec![],
            created_at: "2024-03-01T12:00:00.000Z".into(),
            status: OrderStatus::Ready,
        }))
    }

    async fn create(&self, _order: &KitchenOrder) -> StoreResult<()> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn remove(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn update_status(&self, _id: &str, _status: OrderStatus) -> StoreResult<bool> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn get_all(&self) -> StoreResult<Vec<KitchenOrder>> {
        Ok(vec![])
    }
}

/// Product lookup that always errors
struct FlakyLookup;

#[async_trait]
impl ProductLookup for FlakyLookup {
    async fn get_by_name(&self, _name: &str) -> Result<Option<Product>, CatalogError> {
        Err(CatalogError::Lookup("catalog offline".into()))
    }
}

struct Harness {
    broker: MemoryBroker,
    channel: MemoryChannel,
    live: LiveHub,
    viewer: Arc<RecordingViewer>,
    store: Arc<RedbOrderStore>,
}

impl Harness {
    fn new() -> Self {
        let broker = MemoryBroker::new();
        let channel = broker.channel();
        let live = LiveHub::new();
        let viewer = Arc::new(RecordingViewer::default());
        live.connect(viewer.clone());
        Self {
            broker,
            channel,
            live,
            viewer,
            store: Arc::new(RedbOrderStore::open_in_memory().unwrap()),
        }
    }

    fn worker(&self) -> IngestionWorker {
        self.worker_with(self.store.clone(), Arc::new(MenuCatalog::new(vec![])))
    }

    fn worker_with(
        &self,
        store: Arc<dyn OrderStore>,
        products: Arc<dyn ProductLookup>,
    ) -> IngestionWorker {
        IngestionWorker::new(
            Arc::new(self.channel.clone()),
            store,
            products,
            Arc::new(PreparationCalculator::new()),
            self.live.clone(),
        )
    }

    fn publish(&self, payload: &Value, correlation_id: Option<&str>) {
        self.broker.publish(
            ORDERS_QUEUE,
            serde_json::to_vec(payload).unwrap(),
            correlation_id,
        );
    }

    /// Take the head of the orders queue as an unacked delivery on the worker's channel
    async fn take(&self) -> Delivery {
        static PROBES: AtomicUsize = AtomicUsize::new(0);
        let tag = format!("probe-{}", PROBES.fetch_add(1, Ordering::Relaxed));

        let mut stream = self.channel.consume(ORDERS_QUEUE, &tag).await.unwrap();
        let delivery = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        self.channel.cancel(&tag);
        delivery
    }
}

fn juan() -> Value {
    json!({
        "customerName": "Juan",
        "table": "Mesa 5",
        "items": [{"productName": "Hamburguesa", "quantity": 2, "unitPrice": 10000}]
    })
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_new_order_without_id_is_created_pending() {
    let h = Harness::new();
    h.publish(&juan(), None);
    let delivery = h.take().await;

    let outcome = h.worker().handle_delivery(delivery).await;

    let Outcome::Acked { order_id, created } = outcome else {
        panic!("expected ack");
    };
    assert!(created);
    assert!(uuid::Uuid::parse_str(&order_id).is_ok());

    let stored = h.store.get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.customer_name, "Juan");
    assert_eq!(stored.items[0].preparation_time_seconds, None);

    assert_eq!(h.viewer.event_types(), vec!["ORDER_NEW", "QUEUE_EMPTY"]);
    let events = h.viewer.events();
    assert_eq!(events[0]["order"]["id"], order_id.as_str());
    assert_eq!(events[1]["message"], "🕒 Esperando nuevos pedidos...");
    assert_eq!(h.channel.acked().len(), 1);
    assert!(h.channel.nacked().is_empty());
}

#[tokio::test]
async fn test_known_id_keeps_existing_status() {
    let h = Harness::new();
    h.store
        .create(&KitchenOrder {
            id: "o-1".into(),
            customer_name: "Juan".into(),
            table: "Mesa 5".into(),
            items: vec![],
            created_at: "2024-03-01T12:00:00.000Z".into(),
            status: OrderStatus::Preparing,
        })
        .await
        .unwrap();

    let mut message = juan();
    message["id"] = json!("o-1");
    message["customerName"] = json!("Juan Pablo");
    h.publish(&message, None);
    let delivery = h.take().await;

    let outcome = h.worker().handle_delivery(delivery).await;

    assert_eq!(
        outcome,
        Outcome::Acked {
            order_id: "o-1".into(),
            created: false
        }
    );
    let stored = h.store.get_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Preparing);
    assert_eq!(stored.customer_name, "Juan Pablo");
    assert_eq!(stored.created_at, "2024-03-01T12:00:00.000Z");
    assert_eq!(stored.items.len(), 1);
    assert_eq!(h.store.get_all().await.unwrap().len(), 1);
    assert_eq!(h.viewer.event_types(), vec!["ORDER_UPDATED", "QUEUE_EMPTY"]);
}

#[tokio::test]
async fn test_enrichment_uses_catalog_minutes() {
    let h = Harness::new();
    let catalog = MenuCatalog::new(vec![Product {
        id: None,
        name: "Hamburguesa".into(),
        price: 10000.0,
        preparation_time: Some(1.5),
        enabled: true,
    }]);
    h.publish(&juan(), None);
    let delivery = h.take().await;

    let outcome = h
        .worker_with(h.store.clone(), Arc::new(catalog))
        .handle_delivery(delivery)
        .await;

    let Outcome::Acked { order_id, .. } = outcome else {
        panic!("expected ack");
    };
    let stored = h.store.get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.items[0].preparation_time_seconds, Some(90.0));
}

#[tokio::test]
async fn test_lookup_failure_is_not_fatal() {
    let h = Harness::new();
    h.publish(&juan(), None);
    let delivery = h.take().await;

    let outcome = h
        .worker_with(h.store.clone(), Arc::new(FlakyLookup))
        .handle_delivery(delivery)
        .await;

    let Outcome::Acked { order_id, .. } = outcome else {
        panic!("expected ack");
    };
    let stored = h.store.get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.items[0].preparation_time_seconds, None);
    assert!(h.broker.messages(DEAD_LETTER_QUEUE).is_empty());
}

#[tokio::test]
async fn test_persistence_failure_dead_letters_with_correlation() {
    let h = Harness::new();
    h.publish(&juan(), Some("corr-42"));
    let delivery = h.take().await;
    let tag = delivery.delivery_tag;

    let outcome = h
        .worker_with(Arc::new(BrokenStore), Arc::new(MenuCatalog::new(vec![])))
        .handle_delivery(delivery)
        .await;

    assert_eq!(outcome, Outcome::DeadLettered { forwarded: true });
    assert_eq!(h.channel.nacked(), vec![(tag, false)]);
    assert!(h.channel.acked().is_empty());
    assert_eq!(h.channel.message_count(ORDERS_QUEUE).await.unwrap(), 0);

    let dead = h.broker.messages(DEAD_LETTER_QUEUE);
    assert_eq!(dead.len(), 1);
    let body: Value = serde_json::from_slice(&dead[0]).unwrap();
    assert_eq!(body["_dlq"]["correlationId"], "corr-42");
    assert_eq!(body["customerName"], "Juan");

    assert!(h.viewer.events().is_empty());
}

#[tokio::test]
async fn test_update_failure_dead_letters() {
    let h = Harness::new();
    let mut message = juan();
    message["id"] = json!("o-9");
    h.publish(&message, Some("c1"));
    let delivery = h.take().await;
    let tag = delivery.delivery_tag;

    let outcome = h
        .worker_with(Arc::new(ReadOnlyStore), Arc::new(MenuCatalog::new(vec![])))
        .handle_delivery(delivery)
        .await;

    assert_eq!(outcome, Outcome::DeadLettered { forwarded: true });
    assert_eq!(h.channel.nacked(), vec![(tag, false)]);
    assert!(h.channel.acked().is_empty());

    let dead = h.broker.messages(DEAD_LETTER_QUEUE);
    assert_eq!(dead.len(), 1);
    let body: Value = serde_json::from_slice(&dead[0]).unwrap();
    assert_eq!(body["_dlq"]["correlationId"], "c1");
    assert_eq!(body["id"], "o-9");
    assert!(h.viewer.events().is_empty());
}

#[tokio::test]
async fn test_ack_failure_dead_letters() {
    let h = Harness::new();
    h.publish(&juan(), None);
    let delivery = h.take().await;
    let tag = delivery.delivery_tag;
    h.channel.set_fail_ack(true);

    let outcome = h.worker().handle_delivery(delivery).await;

    assert_eq!(outcome, Outcome::DeadLettered { forwarded: true });
    assert!(h.channel.acked().is_empty());
    assert_eq!(h.channel.nacked(), vec![(tag, false)]);
    assert_eq!(h.broker.messages(DEAD_LETTER_QUEUE).len(), 1);
    assert!(h.broker.messages(ORDERS_QUEUE).is_empty());
}

#[tokio::test]
async fn test_dead_letter_failure_still_nacks() {
    let h = Harness::new();
    h.broker.publish(ORDERS_QUEUE, b"not json".to_vec(), None);
    let delivery = h.take().await;
    let tag = delivery.delivery_tag;
    h.channel.set_fail_publish(true);

    let outcome = h.worker().handle_delivery(delivery).await;

    assert_eq!(outcome, Outcome::DeadLettered { forwarded: false });
    assert_eq!(h.channel.nacked(), vec![(tag, false)]);
    assert!(h.channel.acked().is_empty());
    assert!(h.broker.messages(DEAD_LETTER_QUEUE).is_empty());
    assert!(h.broker.messages(ORDERS_QUEUE).is_empty());
}

#[tokio::test]
async fn test_dead_letter_falls_back_to_worker_channel() {
    let h = Harness::new();
    h.broker.publish(ORDERS_QUEUE, b"not json".to_vec(), None);
    let delivery = h.take().await;
    h.channel.set_fail_publish(true);

    let fallback: Arc<dyn QueueChannel> = Arc::new(h.broker.channel());
    let outcome = h
        .worker()
        .with_dead_letter_fallback(fallback)
        .handle_delivery(delivery)
        .await;

    assert_eq!(outcome, Outcome::DeadLettered { forwarded: true });
    assert_eq!(h.broker.messages(DEAD_LETTER_QUEUE), vec![b"not json".to_vec()]);
}

#[tokio::test]
async fn test_queue_empty_only_after_last_message() {
    let h = Harness::new();
    h.channel.assert_queue(ORDERS_QUEUE).await.unwrap();
    h.publish(&juan(), None);
    h.publish(&juan(), None);

    let shutdown = CancellationToken::new();
    let worker = h.worker();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    let channel = h.channel.clone();
    wait_until(|| channel.acked().len() == 2).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(
        h.viewer.event_types(),
        vec!["ORDER_NEW", "ORDER_NEW", "QUEUE_EMPTY"]
    );
    assert_eq!(h.store.get_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_consumer_cancel_stops_worker_without_settling() {
    let h = Harness::new();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(h.worker().run(shutdown));

    let broker = h.broker.clone();
    wait_until(|| broker.queue_exists(ORDERS_QUEUE)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.channel.cancel("kitchen-worker");

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(h.channel.acked().is_empty());
    assert!(h.channel.nacked().is_empty());
}

#[tokio::test]
async fn test_prefetch_holds_one_message_in_flight() {
    let h = Harness::new();
    h.channel.assert_queue(ORDERS_QUEUE).await.unwrap();
    h.publish(&juan(), None);
    h.publish(&juan(), None);

    let worker = h.worker();
    let mut deliveries = worker.start().await.unwrap();
    let first = deliveries.next().await.unwrap().unwrap();

    let blocked = tokio::time::timeout(Duration::from_millis(50), deliveries.next()).await;
    assert!(blocked.is_err());
    assert_eq!(h.channel.unacked_count(), 1);

    worker.handle_delivery(first).await;
    let second = tokio::time::timeout(Duration::from_secs(1), deliveries.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.delivery_tag, 2);
}

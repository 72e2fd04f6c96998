//! Durable order store
//!
//! Orders are stored as JSON keyed by id. Every call is its own transaction;
//! an update through `remove` + `create` is therefore two transactions and
//! not atomic.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::{KitchenOrder, OrderStatus};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orders table: key = order id, value = JSON
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kitchen_orders");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract used by the ingestion worker and the kitchen API
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<KitchenOrder>>;

    /// Insert, replacing any record with the same id
    async fn create(&self, order: &KitchenOrder) -> StoreResult<()>;

    async fn remove(&self, id: &str) -> StoreResult<()>;

    /// Returns true iff a record with `id` existed
    async fn update_status(&self, id: &str, status: OrderStatus) -> StoreResult<bool>;

    /// All orders, newest `createdAt` first
    async fn get_all(&self) -> StoreResult<Vec<KitchenOrder>>;
}

/// redb-backed order store
#[derive(Clone)]
pub struct RedbOrderStore {
    db: Arc<Database>,
}

impl RedbOrderStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_order(&self, id: &str) -> StoreResult<Option<KitchenOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn write_order(&self, order: &KitchenOrder) -> StoreResult<()> {
        let value = serde_json::to_vec(order)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            table.insert(order.id.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_order(&self, id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            table.remove(id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn set_status(&self, id: &str, status: OrderStatus) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let found = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let existing = table.get(id)?.map(|guard| guard.value().to_vec());
            match existing {
                Some(bytes) => {
                    let mut order: KitchenOrder = serde_json::from_slice(&bytes)?;
                    order.status = status;
                    let value = serde_json::to_vec(&order)?;
                    table.insert(id, value.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(found)
    }

    fn read_all(&self) -> StoreResult<Vec<KitchenOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let order: KitchenOrder = serde_json::from_slice(value.value())?;
            orders.push(order);
        }
        sort_newest_first(&mut orders);
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for RedbOrderStore {
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<KitchenOrder>> {
        self.read_order(id)
    }

    async fn create(&self, order: &KitchenOrder) -> StoreResult<()> {
        self.write_order(order)
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        self.delete_order(id)
    }

    async fn update_status(&self, id: &str, status: OrderStatus) -> StoreResult<bool> {
        self.set_status(id, status)
    }

    async fn get_all(&self) -> StoreResult<Vec<KitchenOrder>> {
        self.read_all()
    }
}

/// Unparseable timestamps sort after every parseable one
fn sort_newest_first(orders: &mut [KitchenOrder]) {
    orders.sort_by_cached_key(|order| {
        std::cmp::Reverse(DateTime::<FixedOffset>::parse_from_rfc3339(&order.created_at).ok())
    });
}

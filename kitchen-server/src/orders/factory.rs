//! Reconciliation of inbound messages into kitchen orders

use chrono::{SecondsFormat, Utc};
use shared::order::{KitchenOrder, OrderMessage, OrderStatus};
use uuid::Uuid;

/// Build a kitchen order from an inbound message with status `preparing`
pub fn from_message(msg: OrderMessage) -> KitchenOrder {
    from_message_with_status(msg, OrderStatus::Preparing)
}

/// Build a kitchen order from an inbound message, seeding `status`
///
/// A missing or empty `id` becomes a fresh v4 UUID; a missing or empty
/// `createdAt` becomes the current instant (ISO-8601, millisecond precision).
/// Items pass through untouched.
pub fn from_message_with_status(msg: OrderMessage, status: OrderStatus) -> KitchenOrder {
    let OrderMessage {
        id,
        customer_name,
        table,
        items,
        created_at,
    } = msg;

    KitchenOrder {
        id: id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        customer_name,
        table,
        items,
        created_at: created_at
            .filter(|ts| !ts.is_empty())
            .unwrap_or_else(now_iso),
        status,
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

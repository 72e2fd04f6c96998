//! Live events pushed to kitchen viewers

use super::types::KitchenOrder;
use serde::{Deserialize, Serialize};

/// Broadcast event, serialized as a JSON object with a `type` discriminator
///
/// ```json
/// {"type":"ORDER_NEW","order":{...}}
/// {"type":"QUEUE_EMPTY","message":"..."}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveEvent {
    /// First sighting of an order id
    OrderNew { order: KitchenOrder },
    /// Upstream re-sent an order that was already stored
    OrderUpdated { order: KitchenOrder },
    /// Status changed through the kitchen API
    OrderStatusChanged { order: KitchenOrder },
    /// Orders queue drained after the last ack
    QueueEmpty { message: String },
}

impl LiveEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LiveEvent::OrderNew { .. } => "ORDER_NEW",
            LiveEvent::OrderUpdated { .. } => "ORDER_UPDATED",
            LiveEvent::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
            LiveEvent::QueueEmpty { .. } => "QUEUE_EMPTY",
        }
    }

    pub fn order(&self) -> Option<&KitchenOrder> {
        match self {
            LiveEvent::OrderNew { order }
            | LiveEvent::OrderUpdated { order }
            | LiveEvent::OrderStatusChanged { order } => Some(order),
            LiveEvent::QueueEmpty { .. } => None,
        }
    }
}

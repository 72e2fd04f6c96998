//! Shared types for the kitchen pipeline
//!
//! Wire and domain types used by the kitchen server and by anything that
//! produces orders onto its queue: order messages, kitchen orders, live
//! events, products, queue constants and the unified error model.

pub mod error;
pub mod message;
pub mod models;
pub mod order;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use order::{KitchenOrder, LiveEvent, OrderItem, OrderMessage, OrderStatus};

//! Kitchen Orders API Module
//!
//! Kitchen display endpoints: list orders, change status, edit pending orders.

mod handler;

use axum::{Router, routing::get, routing::patch};

use crate::core::ServerState;

pub use handler::{StatusChanged, UpdateOrderRequest, UpdateStatusRequest};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/kitchen/orders", get(handler::list))
        .route(
            "/kitchen/orders/{id}",
            patch(handler::update_status).put(handler::update_order),
        )
}

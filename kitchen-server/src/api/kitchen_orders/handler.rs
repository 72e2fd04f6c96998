//! Kitchen Orders API Handlers
//!
//! - List all orders, newest first
//! - Change an order's lifecycle status (`ORDER_STATUS_CHANGED`)
//! - Edit a pending order (`ORDER_UPDATED`)

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::order::{KitchenOrder, LiveEvent, OrderItem, OrderStatus};

use crate::core::ServerState;
use crate::utils::{AppError, AppResult, ErrorCode};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusChanged {
    pub success: bool,
    pub id: String,
    pub status: OrderStatus,
}

/// Fields of a pending order that can be edited; missing or empty fields are kept
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub customer_name: Option<String>,
    pub table: Option<String>,
    pub items: Option<Vec<OrderItem>>,
}

/// GET /kitchen/orders
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<KitchenOrder>>> {
    let orders = state.store.get_all().await?;
    Ok(Json(orders))
}

/// PATCH /kitchen/orders/{id}
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<StatusChanged>> {
    let status: OrderStatus = req.status.parse().map_err(|_| {
        AppError::with_message(
            ErrorCode::InvalidOrderStatus,
            format!("Invalid status: {}", req.status),
        )
        .with_detail(
            "validStatuses",
            OrderStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        )
    })?;

    if !state.store.update_status(&id, status).await? {
        return Err(AppError::order_not_found(&id));
    }

    match state.store.get_by_id(&id).await? {
        Some(order) => {
            state.notify(&LiveEvent::OrderStatusChanged { order });
            tracing::info!(order_id = %id, status = %status, "Order status changed");
        }
        None => {
            tracing::warn!(order_id = %id, "Order vanished after status update");
        }
    }

    Ok(Json(StatusChanged {
        success: true,
        id,
        status,
    }))
}

/// PUT /kitchen/orders/{id}
///
/// Only `pending` orders can be edited; the record is replaced (remove + create).
pub async fn update_order(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> AppResult<Json<KitchenOrder>> {
    let existing = state
        .store
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::order_not_found(&id))?;

    if existing.status != OrderStatus::Pending {
        return Err(AppError::conflict(
            ErrorCode::OrderNotEditable,
            format!("Order {} is already {}", id, existing.status),
        ));
    }

    let updated = KitchenOrder {
        customer_name: req
            .customer_name
            .filter(|name| !name.is_empty())
            .unwrap_or(existing.customer_name),
        table: req
            .table
            .filter(|table| !table.is_empty())
            .unwrap_or(existing.table),
        items: req.items.unwrap_or(existing.items),
        ..existing
    };

    state.store.remove(&id).await?;
    state.store.create(&updated).await?;

    state.notify(&LiveEvent::OrderUpdated {
        order: updated.clone(),
    });
    tracing::info!(order_id = %id, "Pending order edited");

    Ok(Json(updated))
}

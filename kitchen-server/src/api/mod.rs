//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`kitchen_orders`] - 厨房订单
//! - `/ws` - 实时推送 ([`crate::live::ws`])

pub mod health;
pub mod kitchen_orders;

use axum::{Router, routing::get};
use http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::{Config, ServerState};
use crate::live::ws::live_ws;

/// All routes, without middleware
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(kitchen_orders::router())
        .route("/ws", get(live_ws))
}

/// Routes plus CORS and request tracing, bound to `state`
pub fn build_app(state: ServerState) -> Router {
    let cors = cors_layer(&state.config);
    build_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok());
    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    }
}

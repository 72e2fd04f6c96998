//! Server Implementation
//!
//! 启动顺序：状态 (目录、规则表、订单存储) → 消息代理 → 工作者 → HTTP 服务器

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::broker::{AmqpConnection, QueueChannel};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerState};
use crate::worker::IngestionWorker;

/// Kitchen server: ingestion worker + HTTP API
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<()> {
        let state = ServerState::initialize(&self.config)?;

        // Broker connection failure is fatal: nothing is consumed
        let connection = match AmqpConnection::connect(&self.config.amqp_url).await {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                tracing::error!(error = %e, "❌ Could not connect to broker, worker not started");
                return Err(e.into());
            }
        };
        let channel: Arc<dyn QueueChannel> = connection.clone();

        let worker = IngestionWorker::new(
            channel,
            state.store.clone(),
            state.products.clone(),
            state.calculator.clone(),
            state.live.clone(),
        )
        .with_queues(&self.config.orders_queue, &self.config.dead_letter_queue)
        .with_prefetch(self.config.prefetch);
        let deliveries = worker.start().await?;

        let mut tasks = BackgroundTasks::new();
        let shutdown = tasks.shutdown_token();

        let worker_token = shutdown.clone();
        tasks.spawn("order_ingestion", TaskKind::Worker, async move {
            worker.consume(deliveries, worker_token).await;
        });

        let signal_token = shutdown.clone();
        tasks.spawn("ctrl_c", TaskKind::Listener, wait_for_ctrl_c(signal_token));
        tasks.log_summary();

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("🍳 Kitchen server listening on {}", addr);

        let app = api::build_app(state);
        let serve_token = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await;

        // HTTP server ended on its own (error): stop the worker as well
        shutdown.cancel();
        tasks.shutdown().await;

        if let Err(e) = connection.close().await {
            tracing::warn!(error = %e, "Failed to close broker connection");
        }

        served?;
        tracing::info!("Kitchen server stopped");
        Ok(())
    }
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down...");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

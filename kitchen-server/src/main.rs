use kitchen_server::{Config, Server, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() {
    // 1. 环境变量 (.env) 与日志
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    print_banner();
    tracing::info!(
        environment = %config.environment,
        orders_queue = %config.orders_queue,
        "🍳 Kitchen server starting..."
    );

    // 2. 启动服务器 (目录、存储、代理、工作者、HTTP)
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

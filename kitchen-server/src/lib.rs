//! Kitchen Server - 厨房订单接入服务
//!
//! # 架构概述
//!
//! 从持久队列消费订单消息，估算制作时间，写入订单存储，并实时推送到厨房显示端：
//!
//! - **消息代理** (`broker`): RabbitMQ (lapin) 与进程内实现，死信转发
//! - **工作者** (`worker`): 逐条处理订单消息（新建 / 更新 / 死信）
//! - **制作时间** (`preparation`): 按注册顺序匹配的规则表
//! - **订单** (`orders`): 消息转换与 redb 持久化
//! - **实时推送** (`live`): WebSocket 查看端广播
//! - **HTTP API** (`api`): 厨房订单状态与编辑接口
//!
//! # 模块结构
//!
//! ```text
//! kitchen-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── broker/        # 队列通道、死信
//! ├── worker/        # 订单接入
//! ├── preparation/   # 制作时间规则
//! ├── catalog/       # 产品目录
//! ├── orders/        # 订单转换与存储
//! ├── live/          # 实时推送
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、错误转换
//! ```

pub mod api;
pub mod broker;
pub mod catalog;
pub mod core;
pub mod live;
pub mod orders;
pub mod preparation;
pub mod utils;
pub mod worker;

// Re-export 公共类型
pub use core::{Config, Server, ServerError, ServerState};
pub use live::LiveHub;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCode};
pub use worker::IngestionWorker;

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

pub fn print_banner() {
    println!(
        r#"
    __ __ _ __       __
   / //_/(_) /______/ /_  ___  ____
  / ,<  / / __/ ___/ __ \/ _ \/ __ \
 / /| |/ / /_/ /__/ / / /  __/ / / /
/_/ |_/_/\__/\___/_/ /_/\___/_/ /_/
    "#
    );
}

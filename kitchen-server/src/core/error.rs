//! 服务器启动错误

use thiserror::Error;

use crate::broker::BrokerError;
use crate::catalog::CatalogError;
use crate::orders::StoreError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("产品目录错误: {0}")]
    Catalog(#[from] CatalogError),

    #[error("订单存储错误: {0}")]
    Store(#[from] StoreError),

    #[error("消息代理错误: {0}")]
    Broker(#[from] BrokerError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

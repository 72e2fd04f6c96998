//! 订单模块
//!
//! - [`factory`] - 入站消息到厨房订单的转换
//! - [`store`] - 订单持久化 (redb)

pub mod factory;
pub mod store;

pub use store::{OrderStore, RedbOrderStore, StoreError, StoreResult};

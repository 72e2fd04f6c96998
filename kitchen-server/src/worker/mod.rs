//! 后台工作者
//!
//! - [`IngestionWorker`] - 订单入站队列消费

pub mod ingestion;

pub use ingestion::{IngestionWorker, ItemEnrichment, Outcome, ProcessError};

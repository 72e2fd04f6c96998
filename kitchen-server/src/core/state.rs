//! 服务器状态

use serde::Serialize;
use std::sync::Arc;

use crate::catalog::{CatalogFile, MenuCatalog, ProductLookup};
use crate::core::{Config, Result};
use crate::live::LiveHub;
use crate::orders::{OrderStore, RedbOrderStore};
use crate::preparation::PreparationCalculator;

/// 服务器状态 - HTTP 处理器与工作者共享的服务引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | store | 订单存储 |
/// | products | 产品查询 |
/// | calculator | 制作时间规则表 |
/// | live | 实时推送 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: Arc<dyn OrderStore>,
    pub products: Arc<dyn ProductLookup>,
    pub calculator: Arc<PreparationCalculator>,
    pub live: LiveHub,
}

impl ServerState {
    pub fn new(
        config: Config,
        store: Arc<dyn OrderStore>,
        products: Arc<dyn ProductLookup>,
        calculator: Arc<PreparationCalculator>,
    ) -> Self {
        Self {
            config,
            store,
            products,
            calculator,
            live: LiveHub::new(),
        }
    }

    /// 初始化：产品目录与规则表 → 订单存储
    pub fn initialize(config: &Config) -> Result<Self> {
        let catalog = CatalogFile::load_optional(config.catalog_file.as_deref())?;
        let calculator = catalog.calculator(config.fallback_seconds_per_unit)?;
        let products = MenuCatalog::new(catalog.products);
        tracing::info!(
            products = products.len(),
            strategies = calculator.len(),
            "Catalog loaded"
        );

        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.database_path();
        let store = RedbOrderStore::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order store opened");

        Ok(Self::new(
            config.clone(),
            Arc::new(store),
            Arc::new(products),
            Arc::new(calculator),
        ))
    }

    /// Fan out a live event; serialization failures are only logged
    pub fn notify<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.live.notify_clients(event) {
            tracing::warn!(error = %e, "Failed to serialize live event");
        }
    }
}

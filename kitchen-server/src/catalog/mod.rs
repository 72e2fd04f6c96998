//! Menu catalog
//!
//! One JSON file carries both the products (for per-item preparation times)
//! and the preparation rules (for the order estimate):
//!
//! ```json
//! {
//!   "products": [{ "name": "Pizza", "price": 12.5, "preparationTime": 10 }],
//!   "preparationRules": [{ "kind": "pattern", "pattern": "pizza", "secondsPerUnit": 600 }]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::Product;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::preparation::{
    PreparationCalculator, PreparationRule, StrategyError, calculator_from_rules,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("Product lookup failed: {0}")]
    Lookup(String),
}

/// Product lookup by name
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Case-insensitive exact name match
    async fn get_by_name(&self, name: &str) -> Result<Option<Product>, CatalogError>;
}

/// Catalog file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub preparation_rules: Vec<PreparationRule>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the configured catalog; no path or a missing file means empty
    pub fn load_optional(path: Option<&Path>) -> Result<Self, CatalogError> {
        let Some(path) = path else {
            tracing::info!("No catalog configured, using fallback preparation times");
            return Ok(Self::default());
        };

        match Self::load(path) {
            Err(CatalogError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::warn!(path = %path.display(), "Catalog file not found, starting empty");
                Ok(Self::default())
            }
            result => result,
        }
    }

    pub fn calculator(
        &self,
        fallback_seconds_per_unit: f64,
    ) -> Result<PreparationCalculator, CatalogError> {
        Ok(calculator_from_rules(
            &self.preparation_rules,
            fallback_seconds_per_unit,
        )?)
    }
}

/// In-memory product index built from the catalog file
///
/// Disabled products are never returned.
#[derive(Debug, Clone, Default)]
pub struct MenuCatalog {
    by_name: HashMap<String, Product>,
}

impl MenuCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        let mut by_name = HashMap::with_capacity(products.len());
        for product in products.into_iter().filter(|p| p.enabled) {
            // First entry wins on duplicate names
            by_name
                .entry(product.name.to_lowercase())
                .or_insert(product);
        }
        tracing::info!(products = by_name.len(), "Menu catalog loaded");
        Self { by_name }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[async_trait]
impl ProductLookup for MenuCatalog {
    async fn get_by_name(&self, name: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self.by_name.get(&name.to_lowercase()).cloned())
    }
}

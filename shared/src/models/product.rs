//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity as listed in the menu catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    /// Minutes per unit
    #[serde(default)]
    pub preparation_time: Option<f64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Product {
    /// Per-unit preparation time in seconds, when the product carries one
    ///
    /// Zero or NaN minutes count as no estimate.
    pub fn preparation_seconds(&self) -> Option<f64> {
        self.preparation_time
            .filter(|minutes| *minutes != 0.0 && !minutes.is_nan())
            .map(|minutes| minutes * 60.0)
    }
}

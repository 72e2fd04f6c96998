//! Builds a calculator from the catalog's `preparationRules`
//!
//! ```json
//! "preparationRules": [
//!   { "kind": "exact",   "productName": "Pizza", "secondsPerUnit": 600 },
//!   { "kind": "pattern", "pattern": "hamburguesa", "secondsPerUnit": 300 },
//!   { "kind": "fixed",   "secondsPerUnit": 60, "enabled": false }
//! ]
//! ```

use super::calculator::PreparationCalculator;
use super::strategy::{
    ExactNameStrategy, FixedRateStrategy, PatternStrategy, Strategy, StrategyError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreparationRule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: RuleKind,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleKind {
    #[serde(rename_all = "camelCase")]
    Exact {
        product_name: String,
        seconds_per_unit: f64,
    },
    #[serde(rename_all = "camelCase")]
    Pattern {
        pattern: String,
        seconds_per_unit: f64,
    },
    #[serde(rename_all = "camelCase")]
    Fixed {
        seconds_per_unit: f64,
        #[serde(default)]
        zero_for_non_positive: bool,
    },
}

impl RuleKind {
    fn to_strategy(&self) -> Result<Strategy, StrategyError> {
        let strategy: Strategy = match self {
            RuleKind::Exact {
                product_name,
                seconds_per_unit,
            } => ExactNameStrategy::new(product_name.as_str(), *seconds_per_unit).into(),
            RuleKind::Pattern {
                pattern,
                seconds_per_unit,
            } => PatternStrategy::case_insensitive(pattern, *seconds_per_unit)?.into(),
            RuleKind::Fixed {
                seconds_per_unit,
                zero_for_non_positive,
            } => {
                let fixed = FixedRateStrategy::new(*seconds_per_unit);
                if *zero_for_non_positive {
                    fixed.zero_for_non_positive().into()
                } else {
                    fixed.into()
                }
            }
        };
        Ok(strategy)
    }
}

/// Register every enabled rule in file order
///
/// Any invalid pattern rejects the whole rule set.
pub fn calculator_from_rules(
    rules: &[PreparationRule],
    fallback_seconds_per_unit: f64,
) -> Result<PreparationCalculator, StrategyError> {
    let mut calculator = PreparationCalculator::with_fallback(fallback_seconds_per_unit);
    for rule in rules.iter().filter(|r| r.enabled) {
        calculator.register(rule.kind.to_strategy()?);
    }

    let unconditional = rules
        .iter()
        .filter(|r| r.enabled)
        .position(|r| matches!(r.kind, RuleKind::Fixed { .. }));
    if let Some(pos) = unconditional
        && pos + 1 < calculator.len()
    {
        tracing::warn!(
            position = pos,
            total = calculator.len(),
            "Fixed preparation rule is not last; later rules will never match"
        );
    }

    tracing::info!(rules = calculator.len(), "Preparation rules loaded");
    Ok(calculator)
}

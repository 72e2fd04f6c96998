//! Preparation-time strategies
//!
//! Each strategy answers two questions: does it apply to a product name, and
//! how many seconds does a given quantity take. [`Strategy`] dispatches to
//! the concrete rule statically; [`CustomStrategy`] boxes anything else.

use enum_dispatch::enum_dispatch;
use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[enum_dispatch]
pub trait PreparationStrategy {
    fn matches(&self, product_name: &str) -> bool;

    /// Seconds needed for `quantity` units
    fn calculate_time(&self, quantity: i64) -> f64;
}

/// Registered rule, evaluated in registration order by the calculator
#[enum_dispatch(PreparationStrategy)]
#[derive(Debug)]
pub enum Strategy {
    ExactName(ExactNameStrategy),
    Pattern(PatternStrategy),
    FixedRate(FixedRateStrategy),
    Custom(CustomStrategy),
}

/// Case-insensitive exact product name
#[derive(Debug, Clone)]
pub struct ExactNameStrategy {
    product_name: String,
    seconds_per_unit: f64,
}

impl ExactNameStrategy {
    pub fn new(product_name: impl Into<String>, seconds_per_unit: f64) -> Self {
        Self {
            product_name: product_name.into().to_lowercase(),
            seconds_per_unit,
        }
    }
}

impl PreparationStrategy for ExactNameStrategy {
    fn matches(&self, product_name: &str) -> bool {
        product_name.to_lowercase() == self.product_name
    }

    fn calculate_time(&self, quantity: i64) -> f64 {
        quantity as f64 * self.seconds_per_unit
    }
}

/// Regular-expression match anywhere in the product name
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    pattern: Regex,
    seconds_per_unit: f64,
}

impl PatternStrategy {
    pub fn new(pattern: Regex, seconds_per_unit: f64) -> Self {
        Self {
            pattern,
            seconds_per_unit,
        }
    }

    /// Compile `pattern` case-insensitively
    pub fn case_insensitive(pattern: &str, seconds_per_unit: f64) -> Result<Self, StrategyError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| StrategyError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self::new(regex, seconds_per_unit))
    }
}

impl PreparationStrategy for PatternStrategy {
    fn matches(&self, product_name: &str) -> bool {
        self.pattern.is_match(product_name)
    }

    fn calculate_time(&self, quantity: i64) -> f64 {
        quantity as f64 * self.seconds_per_unit
    }
}

/// Matches every product at a fixed per-unit rate
///
/// Register it last: nothing after an unconditional rule is ever consulted.
#[derive(Debug, Clone)]
pub struct FixedRateStrategy {
    seconds_per_unit: f64,
    zero_for_non_positive: bool,
}

impl FixedRateStrategy {
    pub fn new(seconds_per_unit: f64) -> Self {
        Self {
            seconds_per_unit,
            zero_for_non_positive: false,
        }
    }

    /// Report 0 seconds for zero or negative quantities
    pub fn zero_for_non_positive(mut self) -> Self {
        self.zero_for_non_positive = true;
        self
    }
}

impl PreparationStrategy for FixedRateStrategy {
    fn matches(&self, _product_name: &str) -> bool {
        true
    }

    fn calculate_time(&self, quantity: i64) -> f64 {
        if self.zero_for_non_positive && quantity <= 0 {
            return 0.0;
        }
        quantity as f64 * self.seconds_per_unit
    }
}

/// Escape hatch for rules defined outside this module
pub struct CustomStrategy(Box<dyn PreparationStrategy + Send + Sync>);

impl CustomStrategy {
    pub fn new(strategy: impl PreparationStrategy + Send + Sync + 'static) -> Self {
        Self(Box::new(strategy))
    }
}

impl PreparationStrategy for CustomStrategy {
    fn matches(&self, product_name: &str) -> bool {
        self.0.matches(product_name)
    }

    fn calculate_time(&self, quantity: i64) -> f64 {
        self.0.calculate_time(quantity)
    }
}

impl fmt::Debug for CustomStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomStrategy")
    }
}

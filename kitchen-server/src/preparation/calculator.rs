use super::strategy::{PreparationStrategy, Strategy};
use super::DEFAULT_SECONDS_PER_UNIT;

/// Ordered strategy registry
///
/// The first registered strategy that matches wins. Nothing can be removed
/// once registered; duplicates are allowed and the earliest one shadows the
/// rest. Quantities are never clamped here.
#[derive(Debug)]
pub struct PreparationCalculator {
    strategies: Vec<Strategy>,
    fallback_seconds_per_unit: f64,
}

impl PreparationCalculator {
    pub fn new() -> Self {
        Self::with_fallback(DEFAULT_SECONDS_PER_UNIT)
    }

    pub fn with_fallback(fallback_seconds_per_unit: f64) -> Self {
        Self {
            strategies: Vec::new(),
            fallback_seconds_per_unit,
        }
    }

    pub fn register(&mut self, strategy: impl Into<Strategy>) {
        self.strategies.push(strategy.into());
    }

    /// Seconds to prepare `quantity` units of `product_name`
    pub fn calculate(&self, product_name: &str, quantity: i64) -> f64 {
        self.strategies
            .iter()
            .find(|s| s.matches(product_name))
            .map(|s| s.calculate_time(quantity))
            .unwrap_or(quantity as f64 * self.fallback_seconds_per_unit)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for PreparationCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preparation::strategy::{
        CustomStrategy, ExactNameStrategy, FixedRateStrategy, PatternStrategy,
    };

    #[test]
    fn test_empty_registry_falls_back() {
        let calc = PreparationCalculator::new();
        assert!(calc.is_empty());
        for q in [-3, 0, 1, 2, 17] {
            assert_eq!(calc.calculate("Cualquier", q), 5.0 * q as f64);
        }
    }

    #[test]
    fn test_single_match_uses_its_rate() {
        let mut calc = PreparationCalculator::new();
        calc.register(ExactNameStrategy::new("Pizza", 90.0));
        for q in [0, 1, 4, 11] {
            assert_eq!(calc.calculate("pizza", q), 90.0 * q as f64);
            assert_eq!(calc.calculate("Ensalada", q), 5.0 * q as f64);
        }
    }

    #[test]
    fn test_first_registered_unconditional_wins() {
        let mut calc = PreparationCalculator::new();
        calc.register(FixedRateStrategy::new(10.0));
        calc.register(FixedRateStrategy::new(1.0));
        for q in [1, 2, 9] {
            assert_eq!(calc.calculate("Conflicto", q), 10.0 * q as f64);
        }
    }

    #[test]
    fn test_pattern_before_default_rule() {
        let mut calc = PreparationCalculator::new();
        calc.register(PatternStrategy::case_insensitive("hamburguesa", 10.0).unwrap());
        calc.register(FixedRateStrategy::new(5.0));

        assert_eq!(calc.calculate("Hamburguesa doble", 2), 20.0);
        assert_eq!(calc.calculate("Papas", 2), 10.0);
    }

    #[test]
    fn test_duplicates_earliest_wins() {
        let mut calc = PreparationCalculator::new();
        calc.register(ExactNameStrategy::new("Café", 30.0));
        calc.register(ExactNameStrategy::new("café", 60.0));
        assert_eq!(calc.len(), 2);
        assert_eq!(calc.calculate("CAFÉ", 1), 30.0);
    }

    #[test]
    fn test_strategy_may_clamp_non_positive() {
        let mut calc = PreparationCalculator::new();
        calc.register(FixedRateStrategy::new(5.0).zero_for_non_positive());
        assert_eq!(calc.calculate("Algo", 0), 0.0);
        assert_eq!(calc.calculate("Algo", -3), 0.0);
    }

    #[test]
    fn test_custom_fallback_rate() {
        let calc = PreparationCalculator::with_fallback(8.0);
        assert_eq!(calc.calculate("x", 3), 24.0);
    }

    #[test]
    fn test_custom_strategy() {
        struct Drinks;
        impl PreparationStrategy for Drinks {
            fn matches(&self, product_name: &str) -> bool {
                product_name.starts_with("Jugo")
            }
            fn calculate_time(&self, _quantity: i64) -> f64 {
                45.0
            }
        }

        let mut calc = PreparationCalculator::new();
        calc.register(CustomStrategy::new(Drinks));
        assert_eq!(calc.calculate("Jugo de mora", 3), 45.0);
        assert_eq!(calc.calculate("Agua", 3), 15.0);
    }
}

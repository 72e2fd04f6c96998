//! 制作时间估算
//!
//! - [`strategy`] - 匹配规则 (精确名称、正则、固定速率)
//! - [`calculator`] - 按注册顺序求值的规则表
//! - [`loader`] - 从产品目录构建规则表

pub mod calculator;
pub mod loader;
pub mod strategy;

pub use calculator::PreparationCalculator;
pub use loader::{PreparationRule, RuleKind, calculator_from_rules};
pub use strategy::{
    CustomStrategy, ExactNameStrategy, FixedRateStrategy, PatternStrategy, PreparationStrategy,
    Strategy, StrategyError,
};

/// 无匹配规则时的每件秒数
pub const DEFAULT_SECONDS_PER_UNIT: f64 = 5.0;

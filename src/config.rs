//! Scoring and risk configuration.
//!
//! Both configs deserialize from partial documents: every field carries a
//! serde default holding the library's standard constant, so a caller only
//! writes the values it wants to change.

use serde::{Deserialize, Serialize};

use crate::{Error, Period, Ratio, Result};

/// Tolerance used when checking that factor weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

// ============================================================
// PATTERN CONFIG
// ============================================================

/// Per-factor weights for the general (configurable) pattern score.
///
/// Must sum to 1.0 so that weighted scores stay in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    #[serde(default = "default_shape_weight")]
    pub shape: Ratio,
    #[serde(default = "default_size_weight")]
    pub size: Ratio,
    #[serde(default = "default_volume_weight")]
    pub volume: Ratio,
    #[serde(default = "default_trend_weight")]
    pub trend: Ratio,
    #[serde(default = "default_context_weight")]
    pub context: Ratio,
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.shape.get() + self.size.get() + self.volume.get() + self.trend.get() + self.context.get()
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            shape: default_shape_weight(),
            size: default_size_weight(),
            volume: default_volume_weight(),
            trend: default_trend_weight(),
            context: default_context_weight(),
        }
    }
}

/// Thresholds and weights controlling pattern scoring sensitivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Body/range ratio below which a body counts as small (default: 0.1)
    #[serde(default = "default_body_ratio_threshold")]
    pub body_ratio_threshold: Ratio,

    /// Shadow/range ratio above which a shadow counts as long (default: 0.2)
    #[serde(default = "default_shadow_ratio_threshold")]
    pub shadow_ratio_threshold: Ratio,

    /// Volume over trailing average that counts as a volume spike (default: 1.5)
    #[serde(default = "default_volume_ratio_threshold")]
    pub volume_ratio_threshold: f64,

    /// Score the preceding trend for reversal patterns (default: true)
    #[serde(default = "default_true")]
    pub trend_context_required: bool,

    /// Minimum trend strength a caller should demand before acting on a
    /// reversal signal (default: 0.6)
    #[serde(default = "default_trend_strength_threshold")]
    pub trend_strength_threshold: Ratio,

    #[serde(default)]
    pub weights: FactorWeights,
}

fn default_body_ratio_threshold() -> Ratio {
    Ratio::new_const(0.1)
}

fn default_shadow_ratio_threshold() -> Ratio {
    Ratio::new_const(0.2)
}

fn default_volume_ratio_threshold() -> f64 {
    1.5
}

fn default_trend_strength_threshold() -> Ratio {
    Ratio::new_const(0.6)
}

fn default_shape_weight() -> Ratio {
    Ratio::new_const(0.4)
}

fn default_size_weight() -> Ratio {
    Ratio::new_const(0.3)
}

fn default_volume_weight() -> Ratio {
    Ratio::new_const(0.1)
}

fn default_trend_weight() -> Ratio {
    Ratio::new_const(0.1)
}

fn default_context_weight() -> Ratio {
    Ratio::new_const(0.1)
}

fn default_true() -> bool {
    true
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            body_ratio_threshold: default_body_ratio_threshold(),
            shadow_ratio_threshold: default_shadow_ratio_threshold(),
            volume_ratio_threshold: default_volume_ratio_threshold(),
            trend_context_required: true,
            trend_strength_threshold: default_trend_strength_threshold(),
            weights: FactorWeights::default(),
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.volume_ratio_threshold.is_finite() || self.volume_ratio_threshold <= 0.0 {
            return Err(Error::OutOfRange {
                field: "volume_ratio_threshold",
                value: self.volume_ratio_threshold,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidConfig(format!(
                "factor weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

// ============================================================
// RISK CONFIG
// ============================================================

/// Static thresholds for the risk engine. All fractions are of total
/// portfolio value or of price, never percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum single position value / total value (default: 5%)
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Ratio,

    /// Maximum aggregate stop-loss risk / total value (default: 10%)
    #[serde(default = "default_max_total_risk")]
    pub max_total_risk: Ratio,

    /// Default stop distance below entry (default: 2%)
    #[serde(default = "default_stop_loss_ratio")]
    pub stop_loss_ratio: Ratio,

    /// Default take-profit distance above entry (default: 6%)
    #[serde(default = "default_take_profit_ratio")]
    pub take_profit_ratio: Ratio,

    /// Trailing stop distance below the highest price seen (default: 3%)
    #[serde(default = "default_trailing_stop_ratio")]
    pub trailing_stop_ratio: Ratio,

    /// Drawdown that raises a critical alert (default: 15%)
    #[serde(default = "default_max_drawdown_limit")]
    pub max_drawdown_limit: Ratio,

    /// Absolute correlation between holdings that raises an alert (default: 0.7)
    #[serde(default = "default_correlation_limit")]
    pub correlation_limit: Ratio,

    /// Trailing window for recent volatility, in days (default: 20)
    #[serde(default = "default_volatility_window")]
    pub volatility_window: Period,

    /// VaR confidence level (default: 95%)
    #[serde(default = "default_var_confidence")]
    pub var_confidence: Ratio,

    /// VaR horizon in days (default: 1)
    #[serde(default = "default_var_horizon")]
    pub var_horizon: Period,
}

fn default_max_position_size() -> Ratio {
    Ratio::new_const(0.05)
}

fn default_max_total_risk() -> Ratio {
    Ratio::new_const(0.10)
}

fn default_stop_loss_ratio() -> Ratio {
    Ratio::new_const(0.02)
}

fn default_take_profit_ratio() -> Ratio {
    Ratio::new_const(0.06)
}

fn default_trailing_stop_ratio() -> Ratio {
    Ratio::new_const(0.03)
}

fn default_max_drawdown_limit() -> Ratio {
    Ratio::new_const(0.15)
}

fn default_correlation_limit() -> Ratio {
    Ratio::new_const(0.7)
}

fn default_volatility_window() -> Period {
    Period::new_const(20)
}

fn default_var_confidence() -> Ratio {
    Ratio::new_const(0.95)
}

fn default_var_horizon() -> Period {
    Period::new_const(1)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_total_risk: default_max_total_risk(),
            stop_loss_ratio: default_stop_loss_ratio(),
            take_profit_ratio: default_take_profit_ratio(),
            trailing_stop_ratio: default_trailing_stop_ratio(),
            max_drawdown_limit: default_max_drawdown_limit(),
            correlation_limit: default_correlation_limit(),
            volatility_window: default_volatility_window(),
            var_confidence: default_var_confidence(),
            var_horizon: default_var_horizon(),
        }
    }
}

impl RiskConfig {
    /// Tighter limits for capital preservation.
    pub fn conservative() -> Self {
        Self {
            max_position_size: Ratio::new_const(0.03),
            max_total_risk: Ratio::new_const(0.06),
            stop_loss_ratio: Ratio::new_const(0.015),
            take_profit_ratio: Ratio::new_const(0.045),
            trailing_stop_ratio: Ratio::new_const(0.02),
            max_drawdown_limit: Ratio::new_const(0.10),
            correlation_limit: Ratio::new_const(0.6),
            var_confidence: Ratio::new_const(0.99),
            ..Self::default()
        }
    }

    /// Looser limits for higher-turnover strategies.
    pub fn aggressive() -> Self {
        Self {
            max_position_size: Ratio::new_const(0.10),
            max_total_risk: Ratio::new_const(0.20),
            stop_loss_ratio: Ratio::new_const(0.03),
            take_profit_ratio: Ratio::new_const(0.09),
            trailing_stop_ratio: Ratio::new_const(0.05),
            max_drawdown_limit: Ratio::new_const(0.25),
            correlation_limit: Ratio::new_const(0.8),
            var_confidence: Ratio::new_const(0.90),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_position_size", self.max_position_size),
            ("max_total_risk", self.max_total_risk),
            ("stop_loss_ratio", self.stop_loss_ratio),
            ("take_profit_ratio", self.take_profit_ratio),
            ("trailing_stop_ratio", self.trailing_stop_ratio),
            ("max_drawdown_limit", self.max_drawdown_limit),
            ("correlation_limit", self.correlation_limit),
        ];
        for (field, ratio) in positive {
            if ratio.get() <= 0.0 {
                return Err(Error::OutOfRange {
                    field,
                    value: ratio.get(),
                    min: f64::MIN_POSITIVE,
                    max: 1.0,
                });
            }
        }
        let confidence = self.var_confidence.get();
        if confidence <= 0.0 || confidence >= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "var_confidence must be strictly between 0 and 1, got {confidence}"
            )));
        }
        Ok(())
    }
}

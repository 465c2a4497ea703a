//! Portfolio state, positions and risk alerts.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================
// POSITION
// ============================================================

/// An open holding in one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    #[inline]
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    #[inline]
    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity * (self.current_price - self.entry_price)
    }

    /// Fraction of the current price lost if the stop fills.
    pub fn stop_risk_fraction(&self) -> f64 {
        if self.current_price <= 0.0 {
            return 0.0;
        }
        (self.current_price - self.stop_loss) / self.current_price
    }

    /// Currency at risk down to the stop.
    pub fn stop_risk(&self) -> f64 {
        self.market_value() * self.stop_risk_fraction()
    }

    #[inline]
    pub fn stop_triggered(&self) -> bool {
        self.current_price <= self.stop_loss
    }

    #[inline]
    pub fn take_profit_triggered(&self) -> bool {
        self.current_price >= self.take_profit
    }
}

// ============================================================
// PORTFOLIO STATE
// ============================================================

/// Cash, positions and drawdown tracking for one risk engine.
///
/// Invariant after every revaluation: `total_value = cash + Σ market_value`,
/// `peak_value >= total_value` and `max_drawdown >= current_drawdown`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioState {
    pub total_value: f64,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    /// Currency the portfolio may put at risk: initial capital × max total risk
    pub risk_budget: f64,
    pub peak_value: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64, max_total_risk: f64) -> Self {
        Self {
            total_value: initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            risk_budget: initial_capital * max_total_risk,
            peak_value: initial_capital,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Market value of all open positions.
    pub fn invested_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Recompute total value, then update the peak and both drawdowns.
    pub(crate) fn revalue(&mut self) {
        self.total_value = self.cash + self.invested_value();
        if self.total_value > self.peak_value {
            self.peak_value = self.total_value;
        }
        self.current_drawdown = if self.peak_value > 0.0 {
            (self.peak_value - self.total_value) / self.peak_value
        } else {
            0.0
        };
        self.max_drawdown = self.max_drawdown.max(self.current_drawdown);
    }

    /// Aggregate stop-loss risk as a fraction of total value. `None` when the
    /// portfolio has no positive value to measure against.
    pub fn total_risk_ratio(&self) -> Option<f64> {
        if self.total_value <= 0.0 {
            return None;
        }
        let at_risk: f64 = self.positions.values().map(Position::stop_risk).sum();
        Some(at_risk / self.total_value)
    }

    /// Value fraction of one position. `None` for unknown symbols or a
    /// non-positive total.
    pub fn position_weight(&self, symbol: &str) -> Option<f64> {
        if self.total_value <= 0.0 {
            return None;
        }
        self.position(symbol)
            .map(|p| p.market_value() / self.total_value)
    }

    /// Owned copy for display collaborators.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}

// ============================================================
// ALERTS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TotalRisk,
    MaxDrawdown,
    PositionSize,
    StopLoss,
    TakeProfit,
    Correlation,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::TotalRisk => "total_risk",
            AlertKind::MaxDrawdown => "max_drawdown",
            AlertKind::PositionSize => "position_size",
            AlertKind::StopLoss => "stop_loss",
            AlertKind::TakeProfit => "take_profit",
            AlertKind::Correlation => "correlation",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold breach. Immutable once raised.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAlert {
    pub kind: AlertKind,
    pub message: String,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
    /// Value that crossed the threshold
    pub observed_value: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl RiskAlert {
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        message: impl Into<String>,
        observed_value: f64,
        threshold: f64,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            raised_at: Utc::now(),
            observed_value,
            threshold,
            symbol: None,
        }
    }

    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(symbol: &str, quantity: f64, price: f64, stop: f64) -> Position {
        Position {
            symbol: symbol.to_string(),
            quantity,
            entry_price: price,
            current_price: price,
            entry_time: Utc::now(),
            stop_loss: stop,
            take_profit: price * 1.06,
        }
    }

    #[test]
    fn test_position_quantities() {
        let mut p = position("AAPL", 10.0, 100.0, 98.0);
        p.current_price = 110.0;
        assert_eq!(p.market_value(), 1100.0);
        assert_eq!(p.unrealized_pnl(), 100.0);
        assert!((p.stop_risk_fraction() - 12.0 / 110.0).abs() < 1e-12);
        assert!((p.stop_risk() - 120.0).abs() < 1e-9);
        assert!(p.take_profit_triggered());
        assert!(!p.stop_triggered());
    }

    #[test]
    fn test_revalue_tracks_peak_and_drawdown() {
        let mut state = PortfolioState::new(1000.0, 0.1);
        assert_eq!(state.risk_budget, 100.0);

        state.cash = 0.0;
        state.positions.insert("X".into(), position("X", 10.0, 100.0, 98.0));
        state.revalue();
        assert_eq!(state.total_value, 1000.0);

        state.positions.get_mut("X").unwrap().current_price = 120.0;
        state.revalue();
        assert_eq!(state.peak_value, 1200.0);

        state.positions.get_mut("X").unwrap().current_price = 90.0;
        state.revalue();
        assert!((state.current_drawdown - 0.25).abs() < 1e-12);

        state.positions.get_mut("X").unwrap().current_price = 110.0;
        state.revalue();
        assert!((state.max_drawdown - 0.25).abs() < 1e-12);
        assert!(state.current_drawdown < state.max_drawdown);
    }

    #[test]
    fn test_ratios_skip_worthless_portfolio() {
        let state = PortfolioState::new(0.0, 0.1);
        assert_eq!(state.total_risk_ratio(), None);
        assert_eq!(state.position_weight("X"), None);
    }

    #[test]
    fn test_severity_order_and_serde() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        assert_eq!(
            serde_json::to_string(&AlertKind::TakeProfit).unwrap(),
            "\"take_profit\""
        );
    }

    #[test]
    fn test_alert_for_symbol() {
        let alert = RiskAlert::new(AlertKind::StopLoss, Severity::High, "stop hit", 97.0, 98.0)
            .for_symbol("AAPL");
        assert_eq!(alert.symbol.as_deref(), Some("AAPL"));
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "stop_loss");
        assert_eq!(json["severity"], "high");
    }
}

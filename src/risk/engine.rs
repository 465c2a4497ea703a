//! Risk engine: portfolio bookkeeping, limit checks and alert log.
//!
//! One engine owns one [`PortfolioState`] and one append-only alert log.
//! Mutating calls take `&mut self`, so sharing an engine across threads
//! needs an outer lock.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RiskConfig;
use crate::{Error, Result};

use super::portfolio::{AlertKind, PortfolioState, Position, RiskAlert, Severity};
use super::stats::{self, DrawdownStats};
use super::stop_loss::{StopLossKind, StopLossPolicy};

/// Summary statistics for one price series, valued against the current
/// portfolio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskMetrics {
    /// Annualized volatility over the trailing volatility window
    pub volatility: f64,
    pub var: f64,
    /// Parametric expected shortfall at the same confidence as `var`
    pub cvar: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
}

#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    portfolio: PortfolioState,
    alerts: Vec<RiskAlert>,
}

impl RiskEngine {
    /// Create an engine with an all-cash portfolio.
    pub fn new(initial_capital: f64, config: RiskConfig) -> Result<Self> {
        config.validate()?;
        if !initial_capital.is_finite() || initial_capital < 0.0 {
            return Err(Error::InvalidValue(
                "initial capital must be finite and non-negative",
            ));
        }
        let portfolio = PortfolioState::new(initial_capital, config.max_total_risk.get());
        Ok(Self {
            config,
            portfolio,
            alerts: Vec::new(),
        })
    }

    /// Create with the default config.
    pub fn with_capital(initial_capital: f64) -> Result<Self> {
        Self::new(initial_capital, RiskConfig::default())
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    /// Alerts raised by [`update_portfolio`](Self::update_portfolio), oldest
    /// first.
    pub fn alerts(&self) -> &[RiskAlert] {
        &self.alerts
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    // ─── Statistics ────────────────────────────────────────────────

    /// Annualized volatility of a price series. Zero for fewer than two
    /// prices.
    pub fn volatility(&self, prices: &[f64]) -> f64 {
        stats::annualized_volatility(prices)
    }

    /// Parametric Value-at-Risk of the whole portfolio in currency units:
    /// `total_value × σ × z × √horizon`.
    pub fn value_at_risk(&self, prices: &[f64], confidence: f64) -> f64 {
        self.portfolio.total_value
            * stats::return_std_dev(prices)
            * stats::z_score(confidence)
            * self.horizon_scale()
    }

    pub fn max_drawdown(&self, values: &[f64]) -> DrawdownStats {
        stats::max_drawdown(values)
    }

    /// Kelly position fraction, clamped to `[0, 0.25]`.
    pub fn kelly_position_size(&self, win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
        stats::kelly_fraction(win_rate, avg_win, avg_loss)
    }

    /// Volatility, VaR/CVaR at the configured confidence, drawdown and
    /// risk-adjusted returns for one price series.
    pub fn risk_metrics(&self, prices: &[f64]) -> RiskMetrics {
        let window = self.config.volatility_window.get().saturating_add(1);
        let recent = &prices[prices.len().saturating_sub(window)..];

        let confidence = self.config.var_confidence.get();
        let z = stats::z_score(confidence);
        let sigma = stats::return_std_dev(prices);
        let scaled = self.portfolio.total_value * sigma * self.horizon_scale();

        RiskMetrics {
            volatility: stats::annualized_volatility(recent),
            var: scaled * z,
            cvar: scaled * stats::normal_pdf(z) / (1.0 - confidence),
            max_drawdown: stats::max_drawdown(prices).max,
            sharpe: stats::sharpe_ratio(prices),
            sortino: stats::sortino_ratio(prices),
            calmar: stats::calmar_ratio(prices),
        }
    }

    fn horizon_scale(&self) -> f64 {
        (self.config.var_horizon.get() as f64).sqrt()
    }

    // ─── Stops ─────────────────────────────────────────────────────

    /// Stop price from a stop kind name and a named parameter bundle.
    ///
    /// A missing `ratio` for `fixed` or `trailing` takes the configured
    /// stop-loss or trailing ratio. Unknown kinds fall back to the configured
    /// stop-loss ratio. Parameters outside their accepted range are an error.
    /// `current` only moves trailing stops; fixed and ATR stops ignore it.
    pub fn stop_loss_price(
        &self,
        entry: f64,
        current: f64,
        kind: &str,
        params: &HashMap<&str, f64>,
    ) -> Result<f64> {
        match kind.parse::<StopLossKind>() {
            Ok(kind) => {
                let params = self.with_config_ratio(kind, params);
                let policy = StopLossPolicy::from_params(kind, &params)?;
                Ok(policy.stop_price(entry, current))
            }
            Err(_) => {
                debug!(kind, "unknown stop-loss kind, using configured ratio");
                Ok(self.default_stop_price(entry))
            }
        }
    }

    fn with_config_ratio<'a>(
        &self,
        kind: StopLossKind,
        params: &HashMap<&'a str, f64>,
    ) -> HashMap<&'a str, f64> {
        let mut resolved = params.clone();
        let ratio = match kind {
            StopLossKind::Fixed => self.config.stop_loss_ratio,
            StopLossKind::Trailing => self.config.trailing_stop_ratio,
            StopLossKind::Atr => return resolved,
        };
        resolved.entry("ratio").or_insert(ratio.get());
        resolved
    }

    pub fn stop_price(&self, entry: f64, current: f64, policy: &StopLossPolicy) -> f64 {
        policy.stop_price(entry, current)
    }

    /// `entry × (1 − stop_loss_ratio)`
    pub fn default_stop_price(&self, entry: f64) -> f64 {
        entry * self.config.stop_loss_ratio.complement()
    }

    /// `entry × (1 + take_profit_ratio)`
    pub fn take_profit_price(&self, entry: f64) -> f64 {
        entry * (1.0 + self.config.take_profit_ratio.get())
    }

    // ─── Limits ────────────────────────────────────────────────────

    /// Evaluate portfolio-wide limits: total stop risk, then drawdown, then
    /// each position's weight. Alerts are returned, not logged to the engine.
    pub fn check_limits(&self) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();
        let state = &self.portfolio;

        let max_total_risk = self.config.max_total_risk.get();
        match state.total_risk_ratio() {
            Some(total_risk) if total_risk > max_total_risk => {
                alerts.push(RiskAlert::new(
                    AlertKind::TotalRisk,
                    Severity::High,
                    format!(
                        "total risk {:.2}% exceeds limit {:.2}%",
                        total_risk * 100.0,
                        max_total_risk * 100.0
                    ),
                    total_risk,
                    max_total_risk,
                ));
            }
            Some(_) => {}
            None => debug!(
                total_value = state.total_value,
                "portfolio has no positive value, skipping ratio checks"
            ),
        }

        let limit = self.config.max_drawdown_limit.get();
        if state.current_drawdown > limit {
            alerts.push(RiskAlert::new(
                AlertKind::MaxDrawdown,
                Severity::Critical,
                format!(
                    "drawdown {:.2}% exceeds limit {:.2}%",
                    state.current_drawdown * 100.0,
                    limit * 100.0
                ),
                state.current_drawdown,
                limit,
            ));
        }

        let max_weight = self.config.max_position_size.get();
        for symbol in state.positions.keys() {
            let Some(weight) = state.position_weight(symbol) else {
                continue;
            };
            if weight > max_weight {
                alerts.push(
                    RiskAlert::new(
                        AlertKind::PositionSize,
                        Severity::Medium,
                        format!(
                            "position {symbol} is {:.2}% of portfolio, limit {:.2}%",
                            weight * 100.0,
                            max_weight * 100.0
                        ),
                        weight,
                        max_weight,
                    )
                    .for_symbol(symbol.as_str()),
                );
            }
        }

        for alert in &alerts {
            warn!(
                kind = %alert.kind,
                severity = %alert.severity,
                value = alert.observed_value,
                threshold = alert.threshold,
                "{}",
                alert.message
            );
        }
        alerts
    }

    /// Alert when two holdings move together more than the configured limit.
    pub fn check_correlation(
        &self,
        symbol_a: &str,
        symbol_b: &str,
        prices_a: &[f64],
        prices_b: &[f64],
    ) -> Option<RiskAlert> {
        let rho = stats::correlation(
            &stats::simple_returns(prices_a),
            &stats::simple_returns(prices_b),
        );
        let limit = self.config.correlation_limit.get();
        if rho.abs() <= limit {
            return None;
        }
        let alert = RiskAlert::new(
            AlertKind::Correlation,
            Severity::Medium,
            format!("{symbol_a}/{symbol_b} correlation {rho:.2} exceeds limit {limit:.2}"),
            rho,
            limit,
        );
        warn!(a = symbol_a, b = symbol_b, rho, limit, "correlation limit breached");
        Some(alert)
    }

    // ─── Portfolio lifecycle ───────────────────────────────────────

    /// Buy into a new position, debiting cash. Missing stop and take-profit
    /// levels are derived from the config ratios.
    pub fn open_position(
        &mut self,
        symbol: &str,
        quantity: f64,
        entry_price: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<&Position> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(Error::InvalidValue("quantity must be positive"));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(Error::InvalidValue("entry price must be positive"));
        }
        for level in [stop_loss, take_profit].into_iter().flatten() {
            if !level.is_finite() || level < 0.0 {
                return Err(Error::InvalidValue(
                    "stop and take-profit levels must be finite and non-negative",
                ));
            }
        }
        if self.portfolio.positions.contains_key(symbol) {
            return Err(Error::DuplicatePosition(symbol.to_string()));
        }
        let cost = quantity * entry_price;
        if cost > self.portfolio.cash {
            return Err(Error::InsufficientCash {
                need: cost,
                available: self.portfolio.cash,
            });
        }

        let position = Position {
            symbol: symbol.to_string(),
            quantity,
            entry_price,
            current_price: entry_price,
            entry_time: Utc::now(),
            stop_loss: stop_loss.unwrap_or_else(|| self.default_stop_price(entry_price)),
            take_profit: take_profit.unwrap_or_else(|| self.take_profit_price(entry_price)),
        };
        info!(
            symbol,
            quantity,
            entry_price,
            stop_loss = position.stop_loss,
            take_profit = position.take_profit,
            "opened position"
        );

        self.portfolio.cash -= cost;
        self.portfolio.positions.insert(symbol.to_string(), position);
        self.portfolio.revalue();

        self.portfolio
            .position(symbol)
            .ok_or_else(|| Error::UnknownPosition(symbol.to_string()))
    }

    /// Sell a position at its last price, crediting cash.
    pub fn close_position(&mut self, symbol: &str) -> Result<Position> {
        let position = self
            .portfolio
            .positions
            .remove(symbol)
            .ok_or_else(|| Error::UnknownPosition(symbol.to_string()))?;

        self.portfolio.cash += position.market_value();
        self.portfolio.revalue();
        info!(
            symbol,
            exit_price = position.current_price,
            pnl = position.unrealized_pnl(),
            "closed position"
        );
        Ok(position)
    }

    /// Mark a held symbol to a new price, revalue the portfolio and log
    /// stop-loss or take-profit alerts for that symbol.
    ///
    /// Returns `false` when the symbol is not held or the price is not a
    /// positive finite number; the portfolio is left untouched.
    pub fn update_portfolio(&mut self, symbol: &str, price: f64) -> bool {
        if !price.is_finite() || price <= 0.0 {
            warn!(symbol, price, "ignoring invalid price update");
            return false;
        }
        let Some(position) = self.portfolio.positions.get_mut(symbol) else {
            return false;
        };
        position.current_price = price;
        self.portfolio.revalue();
        self.check_exit_levels(symbol);
        true
    }

    fn check_exit_levels(&mut self, symbol: &str) {
        let Some(position) = self.portfolio.position(symbol) else {
            return;
        };
        let mut raised = Vec::with_capacity(2);
        if position.stop_triggered() {
            raised.push(
                RiskAlert::new(
                    AlertKind::StopLoss,
                    Severity::High,
                    format!("stop loss hit for {symbol}"),
                    position.current_price,
                    position.stop_loss,
                )
                .for_symbol(symbol),
            );
        }
        if position.take_profit_triggered() {
            raised.push(
                RiskAlert::new(
                    AlertKind::TakeProfit,
                    Severity::Medium,
                    format!("take profit hit for {symbol}"),
                    position.current_price,
                    position.take_profit,
                )
                .for_symbol(symbol),
            );
        }
        for alert in raised {
            self.raise(alert);
        }
    }

    fn raise(&mut self, alert: RiskAlert) {
        warn!(
            kind = %alert.kind,
            severity = %alert.severity,
            symbol = alert.symbol.as_deref().unwrap_or(""),
            value = alert.observed_value,
            threshold = alert.threshold,
            "{}",
            alert.message
        );
        self.alerts.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Period, Ratio};

    fn engine() -> RiskEngine {
        RiskEngine::with_capital(100_000.0).unwrap()
    }

    #[test]
    fn test_new_portfolio() {
        let e = engine();
        let p = e.portfolio();
        assert_eq!(p.cash, 100_000.0);
        assert_eq!(p.total_value, 100_000.0);
        assert_eq!(p.peak_value, 100_000.0);
        assert!((p.risk_budget - 10_000.0).abs() < 1e-9);
        assert!(e.alerts().is_empty());
    }

    #[test]
    fn test_new_rejects_bad_inputs() {
        assert!(RiskEngine::with_capital(f64::NAN).is_err());
        assert!(RiskEngine::with_capital(-1.0).is_err());
        let bad = RiskConfig {
            max_position_size: Ratio::new_const(0.0),
            ..RiskConfig::default()
        };
        assert!(RiskEngine::new(1000.0, bad).is_err());
    }

    #[test]
    fn test_var_uses_portfolio_value() {
        let e = engine();
        let prices = [100.0, 110.0, 99.0];
        let sigma = 0.02_f64.sqrt();
        assert!((e.value_at_risk(&prices, 0.95) - 100_000.0 * sigma * 1.645).abs() < 1e-6);
        assert!((e.value_at_risk(&prices, 0.99) - 100_000.0 * sigma * 2.326).abs() < 1e-6);
        assert_eq!(e.value_at_risk(&[100.0], 0.95), 0.0);
    }

    #[test]
    fn test_stop_loss_price_dispatch() {
        let e = engine();
        let empty = HashMap::new();
        let fixed = e.stop_loss_price(100.0, 100.0, "fixed", &empty).unwrap();
        assert!((fixed - 98.0).abs() < 1e-12);

        let mut atr = HashMap::new();
        atr.insert("atr", 1.5);
        atr.insert("multiplier", 2.0);
        assert!((e.stop_loss_price(100.0, 100.0, "atr", &atr).unwrap() - 97.0).abs() < 1e-12);

        // Unknown kind: configured ratio
        let conservative = RiskEngine::new(1000.0, RiskConfig::conservative()).unwrap();
        let fallback = conservative
            .stop_loss_price(100.0, 100.0, "chandelier", &empty)
            .unwrap();
        assert!((fallback - 98.5).abs() < 1e-12);
    }

    #[test]
    fn test_stop_loss_price_follows_preset_ratios() {
        let empty = HashMap::new();
        let conservative = RiskEngine::new(1000.0, RiskConfig::conservative()).unwrap();
        let trailing = conservative.stop_loss_price(100.0, 100.0, "trailing", &empty).unwrap();
        assert!((trailing - 98.0).abs() < 1e-12);
        let fixed = conservative.stop_loss_price(100.0, 100.0, "fixed", &empty).unwrap();
        assert!((fixed - 98.5).abs() < 1e-12);

        let aggressive = RiskEngine::new(1000.0, RiskConfig::aggressive()).unwrap();
        let trailing = aggressive.stop_loss_price(100.0, 120.0, "trailing", &empty).unwrap();
        assert!((trailing - 114.0).abs() < 1e-12);

        // Explicit ratio wins over the config
        let mut params = HashMap::new();
        params.insert("ratio", 0.1);
        let explicit = conservative.stop_loss_price(100.0, 100.0, "trailing", &params).unwrap();
        assert!((explicit - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_risk_metrics_with_huge_window() {
        let config = RiskConfig {
            volatility_window: Period::new(usize::MAX).unwrap(),
            ..RiskConfig::default()
        };
        let e = RiskEngine::new(1000.0, config).unwrap();
        let prices = [100.0, 101.0, 99.0];
        let metrics = e.risk_metrics(&prices);
        assert!((metrics.volatility - stats::annualized_volatility(&prices)).abs() < 1e-12);
    }

    #[test]
    fn test_stop_loss_price_rejects_bad_ratio() {
        let e = engine();
        let mut params = HashMap::new();
        params.insert("ratio", -0.1);
        assert!(e.stop_loss_price(100.0, 100.0, "trailing", &params).is_err());
    }

    #[test]
    fn test_open_and_close_position() {
        let mut e = engine();
        let p = e.open_position("AAPL", 10.0, 150.0, None, None).unwrap();
        assert!((p.stop_loss - 147.0).abs() < 1e-9);
        assert!((p.take_profit - 159.0).abs() < 1e-9);
        assert_eq!(e.portfolio().cash, 98_500.0);
        assert_eq!(e.portfolio().total_value, 100_000.0);

        assert!(e.update_portfolio("AAPL", 155.0));
        let closed = e.close_position("AAPL").unwrap();
        assert_eq!(closed.unrealized_pnl(), 50.0);
        assert_eq!(e.portfolio().cash, 100_050.0);
        assert!(e.portfolio().positions.is_empty());
    }

    #[test]
    fn test_open_position_rejections() {
        let mut e = RiskEngine::with_capital(1_000.0).unwrap();
        assert!(matches!(
            e.open_position("X", 100.0, 20.0, None, None),
            Err(Error::InsufficientCash { .. })
        ));
        assert!(e.open_position("X", 0.0, 20.0, None, None).is_err());
        assert!(e.open_position("X", 1.0, f64::NAN, None, None).is_err());
        e.open_position("X", 1.0, 20.0, None, None).unwrap();
        assert!(matches!(
            e.open_position("X", 1.0, 20.0, None, None),
            Err(Error::DuplicatePosition(_))
        ));
        assert!(matches!(
            e.close_position("Y"),
            Err(Error::UnknownPosition(_))
        ));
    }

    #[test]
    fn test_update_unknown_or_invalid_price() {
        let mut e = engine();
        assert!(!e.update_portfolio("NOPE", 10.0));
        e.open_position("AAPL", 10.0, 150.0, None, None).unwrap();
        assert!(!e.update_portfolio("AAPL", 0.0));
        assert!(!e.update_portfolio("AAPL", f64::INFINITY));
        assert_eq!(e.portfolio().position("AAPL").unwrap().current_price, 150.0);
    }

    #[test]
    fn test_update_raises_stop_and_take_profit() {
        let mut e = engine();
        e.open_position("AAPL", 10.0, 100.0, Some(95.0), Some(110.0))
            .unwrap();

        e.update_portfolio("AAPL", 100.0);
        assert!(e.alerts().is_empty());

        e.update_portfolio("AAPL", 94.0);
        assert_eq!(e.alerts().len(), 1);
        assert_eq!(e.alerts()[0].kind, AlertKind::StopLoss);
        assert_eq!(e.alerts()[0].severity, Severity::High);
        assert_eq!(e.alerts()[0].threshold, 95.0);

        e.update_portfolio("AAPL", 111.0);
        assert_eq!(e.alerts().len(), 2);
        assert_eq!(e.alerts()[1].kind, AlertKind::TakeProfit);
        assert_eq!(e.alerts()[1].severity, Severity::Medium);

        e.clear_alerts();
        assert!(e.alerts().is_empty());
    }

    #[test]
    fn test_check_limits_order_and_no_logging() {
        let mut e = RiskEngine::with_capital(10_000.0).unwrap();
        // 50% weight with a stop 30% below: total risk 15%
        e.open_position("BIG", 50.0, 100.0, Some(70.0), Some(200.0))
            .unwrap();
        e.update_portfolio("BIG", 20.0);
        e.clear_alerts();

        let alerts = e.check_limits();
        let kinds: Vec<_> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::MaxDrawdown, AlertKind::PositionSize]);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[1].symbol.as_deref(), Some("BIG"));
        assert!(e.alerts().is_empty());
    }

    #[test]
    fn test_check_limits_total_risk_first() {
        let mut e = RiskEngine::with_capital(10_000.0).unwrap();
        e.open_position("A", 50.0, 100.0, Some(70.0), None).unwrap();
        let alerts = e.check_limits();
        assert_eq!(alerts[0].kind, AlertKind::TotalRisk);
        assert!((alerts[0].observed_value - 0.15).abs() < 1e-12);
        assert_eq!(alerts[1].kind, AlertKind::PositionSize);
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_check_correlation() {
        let e = engine();
        let a = [100.0, 101.0, 99.0, 102.0, 104.0, 103.0];
        let b = [50.0, 50.5, 49.5, 51.0, 52.0, 51.5];
        let alert = e.check_correlation("A", "B", &a, &b).unwrap();
        assert_eq!(alert.kind, AlertKind::Correlation);
        assert!(alert.observed_value > 0.99);

        let c = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        assert!(e.check_correlation("A", "C", &a, &c).is_none());
    }

    #[test]
    fn test_risk_metrics() {
        let e = engine();
        let prices: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1)
            .collect();
        let m = e.risk_metrics(&prices);
        assert!(m.volatility > 0.0);
        assert!(m.var > 0.0);
        assert!(m.cvar > m.var);
        assert!(m.max_drawdown > 0.0 && m.max_drawdown < 1.0);
        assert_eq!(
            m.volatility,
            stats::annualized_volatility(&prices[prices.len() - 21..])
        );
    }
}

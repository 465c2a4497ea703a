//! Risk statistics: pure functions over price and value series.
//!
//! Degenerate inputs (too few points, zero variance, non-positive averages)
//! return zero rather than an error.

use serde::Serialize;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Kelly fractions are capped here regardless of the formula.
pub const MAX_KELLY_FRACTION: f64 = 0.25;

/// Standard deviations below this are treated as zero.
const MIN_STD_DEV: f64 = 1e-15;

/// Tolerance when matching a confidence level against the z-score table.
const CONFIDENCE_TOLERANCE: f64 = 1e-9;

/// One-sided z-scores for the supported VaR confidence levels.
const Z_SCORES: [(f64, f64); 3] = [(0.90, 1.282), (0.95, 1.645), (0.99, 2.326)];

/// z-score used for any confidence level missing from the table.
const DEFAULT_Z_SCORE: f64 = 1.645;

// ─── Returns and moments ───────────────────────────────────────────

/// Simple period returns `(p[i] - p[i-1]) / p[i-1]`.
///
/// Pairs whose earlier price is zero are skipped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Daily return volatility, not annualized.
pub fn return_std_dev(prices: &[f64]) -> f64 {
    sample_std_dev(&simple_returns(prices))
}

/// Annualized volatility: sample stdev of simple returns × √252.
pub fn annualized_volatility(prices: &[f64]) -> f64 {
    return_std_dev(prices) * TRADING_DAYS.sqrt()
}

// ─── Value at Risk ─────────────────────────────────────────────────

/// Map a confidence level to its one-sided z-score. Levels other than 90%,
/// 95% and 99% fall back to the 95% score.
pub fn z_score(confidence: f64) -> f64 {
    Z_SCORES
        .iter()
        .find(|(level, _)| (level - confidence).abs() < CONFIDENCE_TOLERANCE)
        .map(|&(_, z)| z)
        .unwrap_or(DEFAULT_Z_SCORE)
}

/// Standard normal density.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

// ─── Drawdown ──────────────────────────────────────────────────────

/// Peak-to-trough drawdown of a value series, as fractions of the peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DrawdownStats {
    /// Largest drawdown seen anywhere in the series
    pub max: f64,
    /// Drawdown at the last point of the series
    pub current: f64,
}

/// Single forward pass tracking the running peak.
pub fn max_drawdown(values: &[f64]) -> DrawdownStats {
    let Some(&first) = values.first() else {
        return DrawdownStats::default();
    };

    let mut peak = first;
    let mut stats = DrawdownStats::default();
    for &value in values {
        if value > peak {
            peak = value;
        }
        let drawdown = if peak > 0.0 { (peak - value) / peak } else { 0.0 };
        stats.max = stats.max.max(drawdown);
        stats.current = drawdown;
    }
    stats
}

// ─── Sizing ────────────────────────────────────────────────────────

/// Kelly fraction `(b·p − q) / b` with `b = avg_win / avg_loss`, clamped to
/// `[0, MAX_KELLY_FRACTION]`.
///
/// Returns 0 when either average is non-positive.
pub fn kelly_fraction(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if avg_win.is_nan() || avg_loss.is_nan() || avg_win <= 0.0 || avg_loss <= 0.0 {
        return 0.0;
    }
    let b = avg_win / avg_loss;
    let p = win_rate;
    let q = 1.0 - win_rate;
    let f = (b * p - q) / b;
    if !f.is_finite() {
        return 0.0;
    }
    f.clamp(0.0, MAX_KELLY_FRACTION)
}

// ─── Correlation ───────────────────────────────────────────────────

/// Pearson correlation over the common prefix of two series.
///
/// Zero for fewer than two points or when either side has no variance.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < MIN_STD_DEV {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

// ─── Risk-adjusted return ──────────────────────────────────────────

/// Annualized Sharpe ratio of a price series (zero risk-free rate).
pub fn sharpe_ratio(prices: &[f64]) -> f64 {
    let returns = simple_returns(prices);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = sample_std_dev(&returns);
    if std < MIN_STD_DEV {
        return 0.0;
    }
    mean(&returns) / std * TRADING_DAYS.sqrt()
}

/// Annualized Sortino ratio: mean return over downside deviation.
///
/// Zero when no return is negative.
pub fn sortino_ratio(prices: &[f64]) -> f64 {
    let returns = simple_returns(prices);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside = (downside_sq / returns.len() as f64).sqrt();
    if downside < MIN_STD_DEV {
        return 0.0;
    }
    mean(&returns) / downside * TRADING_DAYS.sqrt()
}

/// Annualized mean return over max drawdown. Zero without a drawdown.
pub fn calmar_ratio(prices: &[f64]) -> f64 {
    let drawdown = max_drawdown(prices).max;
    if drawdown < MIN_STD_DEV {
        return 0.0;
    }
    mean(&simple_returns(prices)) * TRADING_DAYS / drawdown
}

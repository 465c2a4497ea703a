//! Single-bar patterns: Hammer, Doji, Marubozu
//!
//! Each function scores `window[0]`. Only Hammer reads older bars, for its
//! volume and trend context.

use crate::config::PatternConfig;
use crate::{BarView, Direction, OHLCV};

use super::helpers::{average_volume, trend_context, LOOKBACK};
use super::{Assessment, Factor};

/// Upper shadow below this fraction of range counts as absent on a hammer.
const HAMMER_MAX_UPPER_SHADOW: f64 = 0.05;

/// Shadows this close in length (as a fraction of range) make a balanced doji.
const DOJI_BALANCE_TOLERANCE: f64 = 0.1;

/// Marubozu shadows may be up to this fraction of the body.
const MARUBOZU_SHADOW_TOLERANCE: f64 = 0.01;

// ============================================================
// HAMMER
// ============================================================

/// Small body near the top of the range with a long lower shadow.
///
/// Uses the five configurable weights. Volume compares against the mean of
/// up to five older bars; trend needs a full window of six.
pub fn hammer<T: OHLCV>(window: &[T], config: &PatternConfig) -> Option<Assessment> {
    let bar = BarView::of(window.first()?);
    if bar.is_flat() || bar.body <= 0.0 {
        return None;
    }

    let mut shape = 0.0;
    if bar.body_ratio() < config.body_ratio_threshold.get() {
        shape += 0.4;
    }
    if bar.lower_shadow_ratio() > config.shadow_ratio_threshold.get() {
        shape += 0.4;
    }
    if bar.upper_shadow_ratio() < HAMMER_MAX_UPPER_SHADOW {
        shape += 0.2;
    }

    let mut size = 0.0;
    if bar.lower_shadow > 2.0 * bar.body {
        size += 0.5;
    }
    if bar.lower_shadow > 3.0 * bar.body {
        size += 0.3;
    }
    if bar.body > 0.01 * bar.range {
        size += 0.2;
    }

    let volume = match average_volume(window) {
        Some(avg) if bar.volume > avg * config.volume_ratio_threshold => 1.0,
        _ => 0.0,
    };

    let trend = if config.trend_context_required
        && window.len() >= LOOKBACK
        && trend_context(&window[1..LOOKBACK]).is_down()
    {
        1.0
    } else {
        0.0
    };

    let closes_strong = bar.close > bar.low && bar.close > bar.open;
    let context = if closes_strong { 1.0 } else { 0.0 };

    let w = &config.weights;
    Some(Assessment {
        factors: vec![
            Factor::new("shape", shape, w.shape.get()),
            Factor::new("size", size, w.size.get()),
            Factor::new("volume", volume, w.volume.get()),
            Factor::new("trend", trend, w.trend.get()),
            Factor::new("context", context, w.context.get()),
        ],
        direction: if closes_strong {
            Direction::Bullish
        } else {
            Direction::Neutral
        },
    })
}

// ============================================================
// DOJI
// ============================================================

/// Open and close nearly equal with long, balanced shadows.
///
/// A body below the threshold only earns half the shape score, so a perfect
/// doji tops out at 0.75.
pub fn doji<T: OHLCV>(window: &[T], config: &PatternConfig) -> Option<Assessment> {
    let bar = BarView::of(window.first()?);
    if bar.is_flat() {
        return None;
    }

    let shape = if bar.body_ratio() < config.body_ratio_threshold.get() {
        0.5
    } else {
        0.0
    };

    let long = config.shadow_ratio_threshold.get();
    let shadow = if bar.upper_shadow_ratio() > long && bar.lower_shadow_ratio() > long {
        1.0
    } else {
        0.0
    };

    let imbalance = (bar.upper_shadow - bar.lower_shadow).abs() / bar.range;
    let balance = if imbalance < DOJI_BALANCE_TOLERANCE {
        1.0
    } else {
        0.0
    };

    Some(Assessment {
        factors: vec![
            Factor::new("shape", shape, 0.5),
            Factor::new("shadow", shadow, 0.3),
            Factor::new("balance", balance, 0.2),
        ],
        direction: Direction::Neutral,
    })
}

// ============================================================
// MARUBOZU
// ============================================================

/// Body spanning nearly the whole range with negligible shadows.
pub fn marubozu<T: OHLCV>(window: &[T], _config: &PatternConfig) -> Option<Assessment> {
    let bar = BarView::of(window.first()?);
    if bar.is_flat() {
        return None;
    }

    let body_ratio = bar.body_ratio();
    let size = if body_ratio > 0.8 {
        1.0
    } else if body_ratio > 0.6 {
        0.7
    } else {
        0.0
    };

    let tolerance = MARUBOZU_SHADOW_TOLERANCE * bar.body;
    let shadow = if bar.upper_shadow <= tolerance && bar.lower_shadow <= tolerance {
        1.0
    } else if bar.upper_shadow <= 2.0 * tolerance && bar.lower_shadow <= 2.0 * tolerance {
        0.7
    } else {
        0.0
    };

    let direction = if bar.bullish {
        Direction::Bullish
    } else if bar.bearish {
        Direction::Bearish
    } else {
        Direction::Neutral
    };
    let directional = if direction == Direction::Neutral {
        0.0
    } else {
        1.0
    };

    Some(Assessment {
        factors: vec![
            Factor::new("size", size, 0.4),
            Factor::new("shadow", shadow, 0.4),
            Factor::new("direction", directional, 0.2),
        ],
        direction,
    })
}

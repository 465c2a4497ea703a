//! Shared context helpers for pattern scoring
//!
//! Trailing volume averages and trend classification over the bars that
//! precede a candidate pattern.

use crate::{Trend, OHLCV};

use super::Factor;

/// Bars of context preceding the classified bar.
pub const CONTEXT_BARS: usize = 5;

/// Longest window any pattern looks at: the bar itself plus its context.
pub const LOOKBACK: usize = CONTEXT_BARS + 1;

/// Minimum bars needed to classify a trend.
const MIN_TREND_BARS: usize = 3;

/// Sum of `score × weight` over all factors.
#[inline]
pub fn weighted_strength(factors: &[Factor]) -> f64 {
    factors.iter().map(Factor::contribution).sum()
}

/// Mean volume of the up-to-five bars preceding `window[0]`.
///
/// Returns `None` when the window has no context bars.
pub fn average_volume<T: OHLCV>(window: &[T]) -> Option<f64> {
    let end = window.len().min(LOOKBACK);
    let context = window.get(1..end)?;
    if context.is_empty() {
        return None;
    }
    let total: f64 = context.iter().map(|b| b.volume()).sum();
    Some(total / context.len() as f64)
}

/// Classify the trend of a most-recent-first run of bars.
///
/// Consecutive closes are compared in chronological order. Rising closes
/// outnumbering falling ones more than two to one is an uptrend, the mirror
/// case a downtrend, anything else sideways. Unchanged closes count for
/// neither side.
pub fn trend_context<T: OHLCV>(bars: &[T]) -> Trend {
    if bars.len() < MIN_TREND_BARS {
        return Trend::Unknown;
    }

    let mut rising = 0usize;
    let mut falling = 0usize;
    for pair in bars.windows(2) {
        let (newer, older) = (pair[0].close(), pair[1].close());
        if newer > older {
            rising += 1;
        } else if newer < older {
            falling += 1;
        }
    }

    if rising > falling * 2 {
        Trend::Uptrend
    } else if falling > rising * 2 {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

//! Two-bar patterns: Bullish Engulfing

use crate::config::PatternConfig;
use crate::{BarView, Direction, OHLCV};

use super::{Assessment, Factor};

/// A bearish bar followed by a bullish bar whose body swallows it.
///
/// `window[1]` is the bearish bar, `window[0]` the engulfing one. Returns
/// `None` unless the colors are bearish then bullish.
pub fn bullish_engulfing<T: OHLCV>(window: &[T], _config: &PatternConfig) -> Option<Assessment> {
    let second = BarView::of(window.first()?);
    let first = BarView::of(window.get(1)?);

    if !first.bearish || !second.bullish {
        return None;
    }

    // Bearish first bar: open > close, so the denominator is its positive body.
    let engulf = if second.open <= first.close && second.close >= first.open {
        let ratio = (second.close - second.open) / (first.open - first.close);
        if ratio > 1.5 {
            1.0
        } else if ratio > 1.2 {
            0.8
        } else {
            0.6
        }
    } else {
        0.0
    };

    let (r1, r2) = (first.body_ratio(), second.body_ratio());
    let size = if r1 > 0.6 && r2 > 0.6 {
        1.0
    } else if r1 > 0.4 && r2 > 0.4 {
        0.7
    } else {
        0.0
    };

    let volume = if second.volume > first.volume * 1.2 {
        1.0
    } else if second.volume > first.volume {
        0.7
    } else {
        0.0
    };

    Some(Assessment {
        factors: vec![
            Factor::new("engulfing", engulf, 0.5),
            Factor::new("size", size, 0.3),
            Factor::new("volume", volume, 0.2),
        ],
        direction: Direction::Bullish,
    })
}

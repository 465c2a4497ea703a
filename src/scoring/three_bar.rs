//! Three-bar patterns: Morning Star

use crate::config::PatternConfig;
use crate::{BarView, Direction, OHLCV};

use super::{Assessment, Factor};

/// Long bearish bar, small-bodied star gapping below it, long bullish bar
/// closing into the first body.
///
/// Window order: `window[2]` bearish, `window[1]` star, `window[0]` bullish.
/// Candle colors are scored rather than required; a flat bar anywhere in the
/// triple is rejected.
pub fn morning_star<T: OHLCV>(window: &[T], _config: &PatternConfig) -> Option<Assessment> {
    let third = BarView::of(window.first()?);
    let second = BarView::of(window.get(1)?);
    let first = BarView::of(window.get(2)?);

    if first.is_flat() || second.is_flat() || third.is_flat() {
        return None;
    }

    let first_score = if first.bearish {
        long_body_score(first.body_ratio())
    } else {
        0.0
    };

    let star_ratio = second.body_ratio();
    let star_score = if star_ratio < 0.3 {
        1.0
    } else if star_ratio < 0.5 {
        0.7
    } else {
        0.0
    };

    let third_score = if third.bullish {
        long_body_score(third.body_ratio())
    } else {
        0.0
    };

    let gapped = second.high < first.close;
    let position = if gapped && third.close > first.midpoint() {
        1.0
    } else if gapped {
        0.7
    } else {
        0.0
    };

    Some(Assessment {
        factors: vec![
            Factor::new("first", first_score, 0.3),
            Factor::new("star", star_score, 0.2),
            Factor::new("third", third_score, 0.3),
            Factor::new("position", position, 0.2),
        ],
        direction: Direction::Bullish,
    })
}

fn long_body_score(body_ratio: f64) -> f64 {
    if body_ratio > 0.6 {
        1.0
    } else if body_ratio > 0.4 {
        0.7
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::weighted_strength;
    use crate::Bar;
    use chrono::{TimeZone, Utc};

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        let t = Utc.with_ymd_and_hms(2025, 1, 27, 0, 0, 0).unwrap();
        Bar::new_unchecked(t, o, h, l, c, 1000.0)
    }

    #[test]
    fn test_textbook_morning_star() {
        let config = PatternConfig::default();
        let window = [
            bar(96.0, 104.5, 95.5, 104.0),
            bar(95.0, 96.0, 94.0, 95.2),
            bar(105.0, 105.5, 97.0, 97.5),
        ];
        let a = morning_star(&window, &config).unwrap();
        assert!((weighted_strength(&a.factors) - 1.0).abs() < 1e-9);
        assert_eq!(a.direction, Direction::Bullish);
    }

    #[test]
    fn test_no_gap_scores_without_position() {
        let config = PatternConfig::default();
        let window = [
            bar(96.0, 104.5, 95.5, 104.0),
            bar(98.0, 99.0, 97.0, 98.2),
            bar(105.0, 105.5, 97.0, 97.5),
        ];
        let a = morning_star(&window, &config).unwrap();
        assert_eq!(a.factors[3].score, 0.0);
        assert!((weighted_strength(&a.factors) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_flat_star_is_rejected() {
        let config = PatternConfig::default();
        let window = [
            bar(96.0, 104.5, 95.5, 104.0),
            bar(95.0, 95.0, 95.0, 95.0),
            bar(105.0, 105.5, 97.0, 97.5),
        ];
        assert!(morning_star(&window, &config).is_none());
    }
}

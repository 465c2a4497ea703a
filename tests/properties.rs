//! Property tests for scoring and risk invariants.
//!
//! Uses proptest to verify:
//! 1. Flat bars never produce a single-bar detection
//! 2. Confidence equals min(strength, 1) and both stay in [0, 1]
//! 3. Kelly fractions stay within [0, 0.25]
//! 4. Max drawdown never decreases as a series grows and bounds the current drawdown
//! 5. VaR scales linearly with portfolio value
//! 6. Trailing stops never loosen

use candlerisk::prelude::*;
use candlerisk::risk::stats;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
struct ArbBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl OHLCV for ArbBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        self.v
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bar() -> impl Strategy<Value = ArbBar> {
    (1.0..1000.0_f64, 0.0..50.0_f64, 0.0..=1.0_f64, 0.0..=1.0_f64, 0.0..1e6_f64).prop_map(
        |(low, range, a, b, v)| ArbBar {
            o: low + a * range,
            h: low + range,
            l: low,
            c: low + b * range,
            v,
        },
    )
}

fn arb_window() -> impl Strategy<Value = Vec<ArbBar>> {
    prop::collection::vec(arb_bar(), 1..=6)
}

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..10_000.0_f64, 1..60)
}

// ── 1. Flat bars ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn flat_bar_never_detected(price in 0.01..10_000.0_f64, volume in 0.0..1e6_f64) {
        let scorer = PatternScorer::default();
        let window = [ArbBar { o: price, h: price, l: price, c: price, v: volume }];
        for kind in [PatternKind::Hammer, PatternKind::Doji, PatternKind::Marubozu] {
            let result = scorer.score(kind, &window);
            prop_assert!(!result.detected);
            prop_assert_eq!(result.strength, 0.0);
        }
    }
}

// ── 2. Confidence bounds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn confidence_is_capped_strength(window in arb_window()) {
        let scorer = PatternScorer::default();
        for result in scorer.analyze_all(&window) {
            prop_assert_eq!(result.confidence, result.strength.min(1.0));
            prop_assert!(result.strength >= 0.0);
            prop_assert!(result.strength <= 1.0 + 1e-9);
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            if result.detected {
                prop_assert!(result.strength > result.kind.cutoff());
            }
        }
    }

    #[test]
    fn scan_positions_are_in_bounds(bars in prop::collection::vec(arb_bar(), 0..40)) {
        let scorer = PatternScorer::default();
        let found = scorer.scan(&bars).unwrap();
        for r in &found {
            prop_assert!(r.detected);
            prop_assert!(r.position < bars.len());
            prop_assert_eq!(r.price, bars[r.position].c);
        }
        prop_assert!(found.windows(2).all(|w| w[0].position <= w[1].position));
    }
}

// ── 3. Kelly bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn kelly_within_bounds(
        win_rate in 0.0..=1.0_f64,
        avg_win in 0.001..1_000.0_f64,
        avg_loss in 0.001..1_000.0_f64,
    ) {
        let f = stats::kelly_fraction(win_rate, avg_win, avg_loss);
        prop_assert!((0.0..=0.25).contains(&f));
    }
}

// ── 4. Drawdown ordering ─────────────────────────────────────────────

proptest! {
    #[test]
    fn max_drawdown_bounds_current(values in arb_values()) {
        let dd = stats::max_drawdown(&values);
        prop_assert!(dd.max >= dd.current);
        prop_assert!(dd.current >= 0.0);
        prop_assert!(dd.max < 1.0);
    }

    #[test]
    fn max_drawdown_non_decreasing_over_prefixes(values in arb_values()) {
        let mut previous = 0.0;
        for end in 1..=values.len() {
            let dd = stats::max_drawdown(&values[..end]);
            prop_assert!(dd.max >= previous);
            previous = dd.max;
        }
    }
}

// ── 5. VaR linearity ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn var_scales_with_portfolio_value(
        prices in prop::collection::vec(10.0..200.0_f64, 2..40),
        capital in 1_000.0..1_000_000.0_f64,
        factor in 1.0..10.0_f64,
    ) {
        let small = RiskEngine::with_capital(capital).unwrap();
        let large = RiskEngine::with_capital(capital * factor).unwrap();
        let a = small.value_at_risk(&prices, 0.95);
        let b = large.value_at_risk(&prices, 0.95);
        prop_assert!((b - a * factor).abs() <= 1e-9 * b.abs().max(1.0));
    }
}

// ── 6. Trailing stop ratchet ─────────────────────────────────────────

proptest! {
    #[test]
    fn trailing_stop_never_loosens(
        entry in 10.0..500.0_f64,
        ticks in prop::collection::vec(5.0..1_000.0_f64, 1..30),
        ratio in 0.005..0.5_f64,
    ) {
        let mut stop = TrailingStop::new(Ratio::new(ratio).unwrap());
        let floor = entry * (1.0 - ratio);
        let mut last = stop.stop_price(entry, entry);
        for price in ticks {
            stop.observe(price);
            let next = stop.stop_price(entry, price);
            prop_assert!(next >= last);
            prop_assert!(next >= floor);
            last = next;
        }
    }
}

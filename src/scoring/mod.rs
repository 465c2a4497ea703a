//! Candlestick pattern scoring
//!
//! Every pattern follows one template: check the window length, reject flat
//! bars, compute a handful of independent sub-scores in [0, 1], combine them
//! with fixed weights and compare the weighted strength against a
//! per-pattern cutoff.
//!
//! Windows are ordered **most recent bar first**: `window[0]` is the bar
//! being classified, `window[1]` the bar before it, and so on.
//!
//! # Patterns
//!
//! | Pattern | Bars | Cutoff |
//! |---|---|---|
//! | Hammer | 1 (+5 context) | 0.7 |
//! | Doji | 1 | 0.7 |
//! | Marubozu | 1 | 0.7 |
//! | Bullish Engulfing | 2 | 0.6 |
//! | Morning Star | 3 | 0.6 |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::{validate_bars, Direction, Result, OHLCV};

pub mod helpers;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

pub use helpers::{average_volume, trend_context, weighted_strength, CONTEXT_BARS, LOOKBACK};

// ============================================================
// FACTORS
// ============================================================

/// One weighted sub-score of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Factor {
    pub name: &'static str,
    /// Sub-score in [0, 1]
    pub score: f64,
    pub weight: f64,
}

impl Factor {
    pub const fn new(name: &'static str, score: f64, weight: f64) -> Self {
        Self {
            name,
            score,
            weight,
        }
    }

    #[inline]
    pub fn contribution(&self) -> f64 {
        self.score * self.weight
    }
}

/// Sub-scores and direction produced by a pattern's factor function.
///
/// Factor functions return `None` when a precondition fails (flat bar, wrong
/// candle colors); the scorer then reports the pattern as not detected with
/// zero strength.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub factors: Vec<Factor>,
    pub direction: Direction,
}

// ============================================================
// PATTERN KINDS - generated via macro
// ============================================================

/// Macro to generate the PatternKind enum and its per-pattern constants
macro_rules! define_patterns {
    (
        $(
            $variant:ident {
                name: $name:literal,
                bars: $bars:literal,
                cutoff: $cutoff:literal,
                description: $description:literal,
                assess: $assess:path $(,)?
            }
        ),* $(,)?
    ) => {
        /// All scorable patterns - closed set, dispatched by match
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum PatternKind {
            $($variant),*
        }

        impl PatternKind {
            pub const ALL: &'static [PatternKind] = &[$(PatternKind::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),*
                }
            }

            /// Bars required before the pattern can be scored at all
            pub fn min_bars(self) -> usize {
                match self {
                    $(Self::$variant => $bars),*
                }
            }

            /// Strength must exceed this value for `detected = true`
            pub fn cutoff(self) -> f64 {
                match self {
                    $(Self::$variant => $cutoff),*
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $(Self::$variant => $description),*
                }
            }

            fn assess<T: OHLCV>(self, window: &[T], config: &PatternConfig) -> Option<Assessment> {
                match self {
                    $(Self::$variant => $assess(window, config)),*
                }
            }
        }
    };
}

define_patterns! {
    Hammer {
        name: "Hammer",
        bars: 1,
        cutoff: 0.7,
        description: "Hammer - bullish reversal signal",
        assess: single_bar::hammer,
    },
    Doji {
        name: "Doji",
        bars: 1,
        cutoff: 0.7,
        description: "Doji - market indecision",
        assess: single_bar::doji,
    },
    Marubozu {
        name: "Marubozu",
        bars: 1,
        cutoff: 0.7,
        description: "Marubozu - strong directional conviction",
        assess: single_bar::marubozu,
    },
    BullishEngulfing {
        name: "BullishEngulfing",
        bars: 2,
        cutoff: 0.6,
        description: "Bullish Engulfing - strong reversal signal",
        assess: two_bar::bullish_engulfing,
    },
    MorningStar {
        name: "MorningStar",
        bars: 3,
        cutoff: 0.6,
        description: "Morning Star - strong bullish reversal signal",
        assess: three_bar::morning_star,
    },
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================
// PATTERN RESULT
// ============================================================

/// Outcome of scoring one pattern against one window. Never mutated after
/// construction.
#[derive(Debug, Clone, Serialize)]
pub struct PatternResult {
    pub kind: PatternKind,
    pub detected: bool,
    /// Weighted strength in [0, 1]
    pub strength: f64,
    /// `min(strength, 1.0)`
    pub confidence: f64,
    /// Index of the classified bar: 0 within a raw window, the absolute
    /// series index when produced by [`PatternScorer::scan`]
    pub position: usize,
    pub direction: Direction,
    /// Close of the classified bar, for placing chart markers
    pub price: f64,
    pub description: &'static str,
    pub factors: Vec<Factor>,
    pub detected_at: DateTime<Utc>,
}

impl PatternResult {
    fn not_detected(kind: PatternKind, position: usize, price: f64) -> Self {
        Self {
            kind,
            detected: false,
            strength: 0.0,
            confidence: 0.0,
            position,
            direction: Direction::Neutral,
            price,
            description: kind.description(),
            factors: Vec::new(),
            detected_at: Utc::now(),
        }
    }

    fn from_assessment(kind: PatternKind, assessment: Assessment, position: usize, price: f64) -> Self {
        let strength = weighted_strength(&assessment.factors);
        Self {
            kind,
            detected: strength > kind.cutoff(),
            strength,
            confidence: strength.min(1.0),
            position,
            direction: assessment.direction,
            price,
            description: kind.description(),
            factors: assessment.factors,
            detected_at: Utc::now(),
        }
    }

    pub fn pattern_name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Equality ignores `detected_at`, the only wall-clock field.
impl PartialEq for PatternResult {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.detected == other.detected
            && self.strength == other.strength
            && self.confidence == other.confidence
            && self.position == other.position
            && self.direction == other.direction
            && self.price == other.price
            && self.factors == other.factors
    }
}

// ============================================================
// SCORER
// ============================================================

/// Stateless pattern scorer. Holds only an immutable config, so one instance
/// can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct PatternScorer {
    config: PatternConfig,
}

impl PatternScorer {
    /// Create a scorer, rejecting configs whose weights would push scores
    /// outside [0, 1].
    pub fn new(config: PatternConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Score one pattern against a most-recent-first window.
    pub fn score<T: OHLCV>(&self, kind: PatternKind, window: &[T]) -> PatternResult {
        self.score_at(kind, window, 0)
    }

    pub fn score_hammer<T: OHLCV>(&self, window: &[T]) -> PatternResult {
        self.score(PatternKind::Hammer, window)
    }

    pub fn score_doji<T: OHLCV>(&self, window: &[T]) -> PatternResult {
        self.score(PatternKind::Doji, window)
    }

    pub fn score_marubozu<T: OHLCV>(&self, window: &[T]) -> PatternResult {
        self.score(PatternKind::Marubozu, window)
    }

    pub fn score_bullish_engulfing<T: OHLCV>(&self, window: &[T]) -> PatternResult {
        self.score(PatternKind::BullishEngulfing, window)
    }

    pub fn score_morning_star<T: OHLCV>(&self, window: &[T]) -> PatternResult {
        self.score(PatternKind::MorningStar, window)
    }

    /// Score every pattern the window is long enough for, in
    /// [`PatternKind::ALL`] order.
    pub fn analyze_all<T: OHLCV>(&self, window: &[T]) -> Vec<PatternResult> {
        self.analyze_at(window, 0)
    }

    /// Detected patterns with `strength >= min_strength`.
    pub fn strongest<T: OHLCV>(&self, window: &[T], min_strength: f64) -> Vec<PatternResult> {
        self.analyze_all(window)
            .into_iter()
            .filter(|r| r.detected && r.strength >= min_strength)
            .collect()
    }

    /// Slide over a chronological series (oldest first) and return every
    /// detection, positioned at its absolute index.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternResult>> {
        validate_bars(bars)?;

        let mut detections = Vec::new();
        for i in 0..bars.len() {
            let start = (i + 1).saturating_sub(LOOKBACK);
            let window: Vec<&T> = bars[start..=i].iter().rev().collect();
            detections.extend(self.analyze_at(&window, i).into_iter().filter(|r| r.detected));
        }

        tracing::debug!(
            bars = bars.len(),
            detections = detections.len(),
            "pattern scan finished"
        );
        Ok(detections)
    }

    fn analyze_at<T: OHLCV>(&self, window: &[T], position: usize) -> Vec<PatternResult> {
        PatternKind::ALL
            .iter()
            .filter(|kind| window.len() >= kind.min_bars())
            .map(|&kind| self.score_at(kind, window, position))
            .collect()
    }

    fn score_at<T: OHLCV>(&self, kind: PatternKind, window: &[T], position: usize) -> PatternResult {
        let price = window.first().map(|b| b.close()).unwrap_or(0.0);
        if window.len() < kind.min_bars() {
            return PatternResult::not_detected(kind, position, price);
        }
        match kind.assess(window, &self.config) {
            Some(assessment) => PatternResult::from_assessment(kind, assessment, position, price),
            None => PatternResult::not_detected(kind, position, price),
        }
    }
}

// ============================================================
// TESTS
// ============================================================

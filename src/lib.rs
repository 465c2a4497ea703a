//! # candlerisk
//!
//! Candlestick pattern scoring and portfolio risk management.
//!
//! Two independent engines share one data model:
//!
//! - [`scoring::PatternScorer`] classifies short windows of bars into named
//!   patterns with a weighted multi-factor confidence score.
//! - [`risk::RiskEngine`] turns price history and open positions into volatility,
//!   Value-at-Risk, drawdown, Kelly sizing, stop levels and threshold alerts.
//!
//! Neither engine calls the other; callers compose them.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlerisk::prelude::*;
//! use chrono::{TimeZone, Utc};
//!
//! let t = Utc.with_ymd_and_hms(2025, 1, 27, 0, 0, 0).unwrap();
//!
//! // Windows are ordered most recent bar first.
//! let window = vec![Bar::new(t, 106.0, 110.0, 102.0, 106.1, 1_000.0)?];
//! let scorer = PatternScorer::default();
//! let doji = scorer.score_doji(&window);
//! assert!(doji.detected);
//!
//! let mut engine = RiskEngine::new(100_000.0, RiskConfig::default())?;
//! engine.open_position("AAPL", 10.0, 150.0, None, None)?;
//! engine.update_portfolio("AAPL", 140.0);
//! assert_eq!(engine.alerts().len(), 1);
//! # Ok::<(), candlerisk::Error>(())
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod params;
pub mod risk;
pub mod scoring;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{FactorWeights, PatternConfig, RiskConfig},
        // Risk
        risk::{
            AlertKind, AtrStop, DrawdownStats, FixedStop, PortfolioState, Position, RiskAlert,
            RiskEngine, RiskMetrics, Severity, StopLossKind, StopLossPolicy, TrailingStop,
        },
        // Parallel
        scan_parallel,
        // Scoring
        scoring::{Factor, PatternKind, PatternResult, PatternScorer},
        // Types
        Bar,
        BarView,
        Direction,
        // Errors
        Error,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        Trend,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at ingestion and configuration boundaries.
///
/// Degenerate numeric inputs (short windows, flat bars, too few prices) never
/// produce an error; they resolve to "not detected" or zero values instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Unknown stop-loss kind: {0}")]
    UnknownStopLoss(String),

    #[error("No open position for {0}")]
    UnknownPosition(String),

    #[error("Position already open for {0}")]
    DuplicatePosition(String),

    #[error("Insufficient cash: need {need:.2}, available {available:.2}")]
    InsufficientCash { need: f64, available: f64 },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(Error::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// `1.0 - ratio`, the multiplier that moves a price down by this ratio.
    #[inline]
    pub fn complement(self) -> f64 {
        1.0 - self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period in bars or days (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Blanket impl for references, so windows of `&T` (and `&dyn OHLCV`) score
/// the same as owned bars.
impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        (**self).timestamp()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(Error::InvalidBar {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(Error::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(Error::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume().is_nan() || self.volume() < 0.0 {
            return Err(Error::InvalidBar {
                index: 0,
                reason: "volume must be non-negative",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// Validate a whole series, reporting the index of the first bad bar.
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            Error::InvalidBar { reason, .. } => Error::InvalidBar { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// BAR
// ============================================================

/// One OHLCV price record for a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a validated bar. Rejects `high < low`, NaN/infinite prices and
    /// negative volume.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self> {
        let bar = Self::new_unchecked(timestamp, open, high, low, close, volume);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar from a trusted source without validation.
    pub const fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

/// Derived quantities of one bar, captured for a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarView {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub body: f64,
    pub upper_shadow: f64,
    pub lower_shadow: f64,
    pub range: f64,
    pub bullish: bool,
    pub bearish: bool,
}

impl BarView {
    pub fn of<T: OHLCV + ?Sized>(bar: &T) -> Self {
        Self {
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            volume: bar.volume(),
            body: bar.body(),
            upper_shadow: bar.upper_shadow(),
            lower_shadow: bar.lower_shadow(),
            range: bar.range(),
            bullish: bar.is_bullish(),
            bearish: bar.is_bearish(),
        }
    }

    /// True when the range is too small for ratio-based scoring.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.range <= f64::EPSILON
    }

    #[inline]
    pub fn body_ratio(&self) -> f64 {
        self.body / self.range
    }

    #[inline]
    pub fn upper_shadow_ratio(&self) -> f64 {
        self.upper_shadow / self.range
    }

    #[inline]
    pub fn lower_shadow_ratio(&self) -> f64 {
        self.lower_shadow / self.range
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

// ============================================================
// DIRECTION / TREND
// ============================================================

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Neutral => "neutral",
            Direction::Bearish => "bearish",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trend of the bars preceding a candidate pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Uptrend,
    Downtrend,
    #[default]
    Sideways,
    /// Fewer than three bars of context
    Unknown,
}

impl Trend {
    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Trend::Downtrend)
    }

    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, Trend::Uptrend)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;
use scoring::{PatternResult, PatternScorer};

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternResult>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: Error,
}

/// Parallel scanning of multiple instruments.
///
/// Each series is chronological (oldest first). Instruments whose bars fail
/// validation land in the error list; the rest are scanned independently.
pub fn scan_parallel<'a, T, I>(
    scorer: &PatternScorer,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            scorer
                .scan(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    tracing::debug!(
        scanned = successes.len(),
        failed = errors.len(),
        "parallel pattern scan finished"
    );

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

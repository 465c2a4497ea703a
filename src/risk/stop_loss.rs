//! Stop-loss policies
//!
//! Three closed variants compute a stop price from an entry price and the
//! latest price:
//!
//! | Kind | Stop |
//! |---|---|
//! | `fixed` | `entry × (1 − ratio)` |
//! | `trailing` | `max(entry × (1 − ratio), highest × (1 − ratio))` |
//! | `atr` | `entry − atr × multiplier`, or a flat 2% stop without an ATR |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::params::{get_price, get_ratio, ParamMeta, ParameterizedStop};
use crate::{Error, Ratio, Result};

/// Stop distance used by a fixed stop without a `ratio` parameter.
pub const DEFAULT_FIXED_RATIO: f64 = 0.02;

/// Stop distance used by a trailing stop without a `ratio` parameter.
pub const DEFAULT_TRAILING_RATIO: f64 = 0.03;

pub const DEFAULT_ATR_MULTIPLIER: f64 = 2.0;

/// Flat stop distance applied when no ATR is available.
pub const ATR_FALLBACK_RATIO: f64 = 0.02;

// ============================================================
// KIND
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopLossKind {
    Fixed,
    Trailing,
    Atr,
}

impl StopLossKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StopLossKind::Fixed => "fixed",
            StopLossKind::Trailing => "trailing",
            StopLossKind::Atr => "atr",
        }
    }
}

impl fmt::Display for StopLossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StopLossKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(StopLossKind::Fixed),
            "trailing" => Ok(StopLossKind::Trailing),
            "atr" => Ok(StopLossKind::Atr),
            other => Err(Error::UnknownStopLoss(other.to_string())),
        }
    }
}

// ============================================================
// FIXED
// ============================================================

/// Constant distance below entry. Ignores the current price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedStop {
    pub ratio: Ratio,
}

impl FixedStop {
    pub fn new(ratio: Ratio) -> Self {
        Self { ratio }
    }

    pub fn stop_price(&self, entry: f64) -> f64 {
        entry * self.ratio.complement()
    }
}

impl Default for FixedStop {
    fn default() -> Self {
        Self::new(Ratio::new_const(DEFAULT_FIXED_RATIO))
    }
}

static FIXED_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "ratio",
    DEFAULT_FIXED_RATIO,
    "Stop distance below entry",
)];

impl ParameterizedStop for FixedStop {
    fn param_meta() -> &'static [ParamMeta] {
        FIXED_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            ratio: get_ratio(params, "ratio", DEFAULT_FIXED_RATIO)?,
        })
    }

    fn kind() -> StopLossKind {
        StopLossKind::Fixed
    }
}

// ============================================================
// TRAILING
// ============================================================

/// Stop that follows the highest price seen, never below the fixed floor
/// under entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub ratio: Ratio,
    /// Highest price seen since entry; `None` means "entry price"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest: Option<f64>,
}

impl TrailingStop {
    pub fn new(ratio: Ratio) -> Self {
        Self {
            ratio,
            highest: None,
        }
    }

    pub fn with_highest(mut self, highest: f64) -> Self {
        self.highest = Some(highest);
        self
    }

    /// Ratchet the high-water mark upward. Lower or non-finite prices are
    /// ignored.
    pub fn observe(&mut self, price: f64) {
        if !price.is_finite() {
            return;
        }
        match self.highest {
            Some(h) if h >= price => {}
            _ => self.highest = Some(price),
        }
    }

    pub fn stop_price(&self, entry: f64, current: f64) -> f64 {
        let highest = self
            .highest
            .filter(|h| *h > 0.0)
            .unwrap_or(entry)
            .max(current);
        let keep = self.ratio.complement();
        (entry * keep).max(highest * keep)
    }
}

impl Default for TrailingStop {
    fn default() -> Self {
        Self::new(Ratio::new_const(DEFAULT_TRAILING_RATIO))
    }
}

static TRAILING_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "ratio",
        DEFAULT_TRAILING_RATIO,
        "Stop distance below the highest price",
    ),
    ParamMeta::price("highest", "Highest price since entry (0 = entry price)"),
];

impl ParameterizedStop for TrailingStop {
    fn param_meta() -> &'static [ParamMeta] {
        TRAILING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            ratio: get_ratio(params, "ratio", DEFAULT_TRAILING_RATIO)?,
            highest: get_price(params, &TRAILING_PARAMS[1])?,
        })
    }

    fn kind() -> StopLossKind {
        StopLossKind::Trailing
    }
}

// ============================================================
// ATR
// ============================================================

/// Volatility-adjusted stop: a multiple of the average true range below
/// entry.
///
/// Deserializing applies the same checks as [`AtrStop::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAtrStop")]
pub struct AtrStop {
    /// Average true range in price units; `None` falls back to a flat stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
    #[serde(default = "default_atr_multiplier")]
    pub multiplier: f64,
}

fn default_atr_multiplier() -> f64 {
    DEFAULT_ATR_MULTIPLIER
}

#[derive(Deserialize)]
struct RawAtrStop {
    #[serde(default)]
    atr: Option<f64>,
    #[serde(default = "default_atr_multiplier")]
    multiplier: f64,
}

impl TryFrom<RawAtrStop> for AtrStop {
    type Error = Error;

    fn try_from(raw: RawAtrStop) -> Result<Self> {
        AtrStop::new(raw.atr, raw.multiplier)
    }
}

impl AtrStop {
    pub fn new(atr: Option<f64>, multiplier: f64) -> Result<Self> {
        ATR_PARAMS[1].validate(multiplier)?;
        if let Some(atr) = atr {
            ATR_PARAMS[0].validate(atr)?;
        }
        Ok(Self { atr, multiplier })
    }

    pub fn stop_price(&self, entry: f64) -> f64 {
        match self.atr.filter(|a| *a > 0.0) {
            Some(atr) => entry - atr * self.multiplier,
            None => {
                tracing::debug!(entry, "no ATR supplied, using flat stop");
                entry * (1.0 - ATR_FALLBACK_RATIO)
            }
        }
    }
}

impl Default for AtrStop {
    fn default() -> Self {
        Self {
            atr: None,
            multiplier: DEFAULT_ATR_MULTIPLIER,
        }
    }
}

static ATR_PARAMS: &[ParamMeta] = &[
    ParamMeta::price("atr", "Average true range (0 = flat 2% stop)"),
    ParamMeta::multiplier("multiplier", DEFAULT_ATR_MULTIPLIER, "ATR multiple below entry"),
];

impl ParameterizedStop for AtrStop {
    fn param_meta() -> &'static [ParamMeta] {
        ATR_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            atr: get_price(params, &ATR_PARAMS[0])?,
            multiplier: ATR_PARAMS[1].resolve(params)?,
        })
    }

    fn kind() -> StopLossKind {
        StopLossKind::Atr
    }
}

// ============================================================
// POLICY
// ============================================================

/// Closed set of stop-loss policies, dispatched by match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StopLossPolicy {
    Fixed(FixedStop),
    Trailing(TrailingStop),
    Atr(AtrStop),
}

impl StopLossPolicy {
    /// Build a policy from a named parameter bundle. Missing keys take their
    /// documented defaults; out-of-range values are rejected.
    pub fn from_params(kind: StopLossKind, params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(match kind {
            StopLossKind::Fixed => StopLossPolicy::Fixed(FixedStop::with_params(params)?),
            StopLossKind::Trailing => StopLossPolicy::Trailing(TrailingStop::with_params(params)?),
            StopLossKind::Atr => StopLossPolicy::Atr(AtrStop::with_params(params)?),
        })
    }

    pub fn kind(&self) -> StopLossKind {
        match self {
            StopLossPolicy::Fixed(_) => FixedStop::kind(),
            StopLossPolicy::Trailing(_) => TrailingStop::kind(),
            StopLossPolicy::Atr(_) => AtrStop::kind(),
        }
    }

    pub fn param_meta(&self) -> &'static [ParamMeta] {
        match self {
            StopLossPolicy::Fixed(_) => FixedStop::param_meta(),
            StopLossPolicy::Trailing(_) => TrailingStop::param_meta(),
            StopLossPolicy::Atr(_) => AtrStop::param_meta(),
        }
    }

    pub fn stop_price(&self, entry: f64, current: f64) -> f64 {
        match self {
            StopLossPolicy::Fixed(p) => p.stop_price(entry),
            StopLossPolicy::Trailing(p) => p.stop_price(entry, current),
            StopLossPolicy::Atr(p) => p.stop_price(entry),
        }
    }
}

impl From<FixedStop> for StopLossPolicy {
    fn from(p: FixedStop) -> Self {
        StopLossPolicy::Fixed(p)
    }
}

impl From<TrailingStop> for StopLossPolicy {
    fn from(p: TrailingStop) -> Self {
        StopLossPolicy::Trailing(p)
    }
}

impl From<AtrStop> for StopLossPolicy {
    fn from(p: AtrStop) -> Self {
        StopLossPolicy::Atr(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(pairs: &[(&'static str, f64)]) -> HashMap<&'static str, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("fixed".parse::<StopLossKind>().unwrap(), StopLossKind::Fixed);
        assert_eq!("atr".parse::<StopLossKind>().unwrap(), StopLossKind::Atr);
        assert!(matches!(
            "chandelier".parse::<StopLossKind>(),
            Err(Error::UnknownStopLoss(k)) if k == "chandelier"
        ));
    }

    #[test]
    fn test_fixed_ignores_current_price() {
        let stop = FixedStop::new(Ratio::new(0.05).unwrap());
        assert!((stop.stop_price(100.0) - 95.0).abs() < 1e-12);
        assert!((StopLossPolicy::from(stop).stop_price(100.0, 150.0) - 95.0).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_never_below_floor() {
        let stop = TrailingStop::new(Ratio::new(0.1).unwrap());
        // Price fell: the floor under entry holds
        assert!((stop.stop_price(100.0, 80.0) - 90.0).abs() < 1e-12);
        // Price rose: stop follows the current price
        assert!((stop.stop_price(100.0, 120.0) - 108.0).abs() < 1e-12);
        // Remembered high wins over a lower current price
        let high = stop.with_highest(130.0);
        assert!((high.stop_price(100.0, 120.0) - 117.0).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_observe_ratchets_up() {
        let mut stop = TrailingStop::default();
        stop.observe(105.0);
        stop.observe(103.0);
        stop.observe(f64::NAN);
        assert_eq!(stop.highest, Some(105.0));
    }

    #[test]
    fn test_atr_fallback() {
        let stop = AtrStop::default();
        assert!((stop.stop_price(100.0) - 98.0).abs() < 1e-12);

        let stop = AtrStop::new(Some(1.5), 2.0).unwrap();
        assert!((stop.stop_price(100.0) - 97.0).abs() < 1e-12);

        assert!(AtrStop::new(Some(1.5), 0.0).is_err());
    }

    #[test]
    fn test_from_params_defaults() {
        let empty = HashMap::new();
        let fixed = StopLossPolicy::from_params(StopLossKind::Fixed, &empty).unwrap();
        assert!((fixed.stop_price(100.0, 100.0) - 98.0).abs() < 1e-12);

        let trailing = StopLossPolicy::from_params(StopLossKind::Trailing, &empty).unwrap();
        assert!((trailing.stop_price(100.0, 100.0) - 97.0).abs() < 1e-12);

        let atr = StopLossPolicy::from_params(StopLossKind::Atr, &empty).unwrap();
        assert!((atr.stop_price(100.0, 100.0) - 98.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_params_values() {
        let atr = StopLossPolicy::from_params(
            StopLossKind::Atr,
            &bundle(&[("atr", 2.0), ("multiplier", 3.0)]),
        )
        .unwrap();
        assert!((atr.stop_price(100.0, 100.0) - 94.0).abs() < 1e-12);
        assert_eq!(atr.kind(), StopLossKind::Atr);

        let trailing = StopLossPolicy::from_params(
            StopLossKind::Trailing,
            &bundle(&[("ratio", 0.05), ("highest", 120.0)]),
        )
        .unwrap();
        assert!((trailing.stop_price(100.0, 110.0) - 114.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_params_rejects_bad_ratio() {
        let result = StopLossPolicy::from_params(StopLossKind::Fixed, &bundle(&[("ratio", 1.5)]));
        assert!(matches!(result, Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_policy_serde_is_tagged() {
        let policy = StopLossPolicy::from(AtrStop::new(Some(1.0), 2.5).unwrap());
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"kind\":\"atr\""));
        let back: StopLossPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);

        let partial: StopLossPolicy = serde_json::from_str(r#"{"kind":"trailing","ratio":0.04}"#).unwrap();
        assert_eq!(partial.kind(), StopLossKind::Trailing);
    }

    #[test]
    fn test_atr_deserialize_validates() {
        for json in [
            r#"{"kind":"atr","atr":2.0,"multiplier":-3.0}"#,
            r#"{"kind":"atr","atr":2.0,"multiplier":0.0}"#,
            r#"{"kind":"atr","atr":-1.0}"#,
        ] {
            assert!(serde_json::from_str::<StopLossPolicy>(json).is_err(), "{json}");
        }
        assert!(serde_json::from_str::<AtrStop>(r#"{"multiplier":-3.0}"#).is_err());

        let stop: AtrStop = serde_json::from_str(r#"{"atr":2.0}"#).unwrap();
        assert_eq!(stop, AtrStop::new(Some(2.0), DEFAULT_ATR_MULTIPLIER).unwrap());
        assert!((stop.stop_price(100.0) - 96.0).abs() < 1e-12);
    }
}

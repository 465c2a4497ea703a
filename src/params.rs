//! Parameter metadata for stop-loss policies
//!
//! Stop-loss calculators accept a named parameter bundle (`{"atr": …,
//! "multiplier": …}`) at the edges of the system, e.g. when a strategy file
//! names its stop by kind. This module turns such bundles into typed
//! parameters and documents every accepted key.
//!
//! # Example
//!
//! ```rust
//! use candlerisk::params::ParameterizedStop;
//! use candlerisk::risk::AtrStop;
//!
//! for param in AtrStop::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::risk::StopLossKind;
use crate::{Error, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Fraction of price in 0.0..=1.0
    Ratio,
    /// Absolute price distance or level; zero means "not supplied"
    Price,
    /// Positive scale factor
    Multiplier,
}

/// Metadata for a single stop-loss parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
    /// Bundle key (e.g., "ratio")
    pub name: &'static str,
    pub param_type: ParamType,
    /// Value used when the key is missing
    pub default: f64,
    /// Accepted range (min, max)
    pub range: (f64, f64),
    pub description: &'static str,
}

impl ParamMeta {
    pub const fn ratio(name: &'static str, default: f64, description: &'static str) -> Self {
        Self {
            name,
            param_type: ParamType::Ratio,
            default,
            range: (0.0, 1.0),
            description,
        }
    }

    pub const fn price(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            param_type: ParamType::Price,
            default: 0.0,
            range: (0.0, f64::MAX),
            description,
        }
    }

    pub const fn multiplier(name: &'static str, default: f64, description: &'static str) -> Self {
        Self {
            name,
            param_type: ParamType::Multiplier,
            default,
            range: (0.0, f64::MAX),
            description,
        }
    }

    /// Validate a value for this parameter
    pub fn validate(&self, value: f64) -> Result<()> {
        if value.is_nan() || value.is_infinite() {
            return Err(Error::InvalidValue("parameter cannot be NaN or infinite"));
        }
        let (min, max) = self.range;
        if value < min || value > max {
            return Err(Error::OutOfRange {
                field: self.name,
                value,
                min,
                max,
            });
        }
        if self.param_type == ParamType::Multiplier && value == 0.0 {
            return Err(Error::InvalidValue("multiplier must be > 0"));
        }
        Ok(())
    }

    /// Look up this parameter in a bundle, falling back to the default.
    pub fn resolve(&self, params: &HashMap<&str, f64>) -> Result<f64> {
        let value = params.get(self.name).copied().unwrap_or(self.default);
        self.validate(value)?;
        Ok(value)
    }
}

// ============================================================
// PARAMETERIZED STOP TRAIT
// ============================================================

/// Stop-loss calculators that can be built from a named parameter bundle.
pub trait ParameterizedStop: Sized {
    /// Returns metadata for all accepted keys
    fn param_meta() -> &'static [ParamMeta];

    /// Creates a calculator from a bundle. Missing keys use their defaults;
    /// unknown keys are ignored.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

    fn kind() -> StopLossKind;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
    let value = params.get(key).copied().unwrap_or(default);
    Ratio::new(value)
}

/// Helper to get an optional price. Missing or zero means "not supplied".
pub fn get_price(params: &HashMap<&str, f64>, meta: &ParamMeta) -> Result<Option<f64>> {
    let value = meta.resolve(params)?;
    Ok((value > 0.0).then_some(value))
}

// ============================================================
// TESTS
// ============================================================

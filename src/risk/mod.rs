//! Portfolio risk management
//!
//! Pure statistics live in [`stats`]; [`RiskEngine`] applies them to one
//! owned portfolio and keeps the alert log.

pub mod engine;
pub mod portfolio;
pub mod stats;
pub mod stop_loss;

pub use engine::{RiskEngine, RiskMetrics};
pub use portfolio::{AlertKind, PortfolioState, Position, RiskAlert, Severity};
pub use stats::DrawdownStats;
pub use stop_loss::{AtrStop, FixedStop, StopLossKind, StopLossPolicy, TrailingStop};

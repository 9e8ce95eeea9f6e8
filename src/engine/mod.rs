//! Rule Evaluation Engine
//!
//! Per-record dispatch across the rule set, cooldown suppression, the
//! bounded alert channel, and evaluation counters.

/// Per-rule cooldown suppression
pub mod cooldown;
/// Main evaluation engine
#[allow(clippy::module_inception)]
pub mod engine;
/// Monotonic evaluation counters
pub mod stats;

pub use cooldown::CooldownMap;
pub use engine::{AlertEngine, EngineConfig};
pub use stats::{EngineStats, EngineStatsSnapshot};

//! Notification Fan-Out
//!
//! The sink contract, the sliding-window rate limiter protecting sinks,
//! and the dispatcher that fans alerts out to the sinks named by each
//! alert.

/// Dispatcher: sink registry and fan-out with refund semantics
pub mod dispatcher;
/// Sliding-window token admission with refund
pub mod rate_limit;
/// The sink delivery contract
pub mod sink;

pub use dispatcher::Dispatcher;
pub use rate_limit::{RateLimiter, RateLimiterStats};
pub use sink::Sink;

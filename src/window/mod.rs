//! Sliding-Window Event Counting
//!
//! Per-rule time-ordered event buffers with pruning, per-rule caps, and a
//! process-wide event budget enforced by oldest-first eviction.

/// Per-rule window manager with a global event budget
pub mod manager;
/// Time-ordered event-timestamp buffer
pub mod sliding;

pub use manager::WindowManager;
pub use sliding::SlidingWindow;

/// Default cap on buffered events for a single rule's window.
pub const MAX_EVENTS_PER_RULE: usize = 10_000;

/// Default cap on buffered events across all windows.
pub const MAX_TOTAL_EVENTS: usize = 100_000;

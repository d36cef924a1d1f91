//! Metric helpers for `alpine-sdk`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking established sessions.
pub const SESSIONS_ACTIVE: &str = "alpine_sessions_active";
/// Name of the counter tracking streamed frames.
pub const FRAMES_TOTAL: &str = "alpine_frames_total";
/// Name of the counter tracking control retransmissions given up on.
pub const CONTROL_FAILURES: &str = "alpine_control_failures_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "alpine_errors_total";

/// Direction of a streamed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received by a device.
    Inbound,
    /// Frames sent by a controller.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "used only by metric labels"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a streamed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a control request that exhausted its retransmissions.
pub fn inc_control_failures() {
    #[cfg(feature = "metrics")]
    counter!(CONTROL_FAILURES).increment(1);
}

/// Record an error occurrence.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

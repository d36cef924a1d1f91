//! Span and timing helpers for ALPINE client operations.
//!
//! These keep level selection and timing emission out of the client methods.

use std::{net::SocketAddr, time::Instant};

use tracing::{Level, Span};

use super::tracing_config::TracingConfig;

/// Create a tracing span at a dynamically selected level.
///
/// Each branch calls the matching `tracing::<level>_span!` macro so the span
/// metadata stays static per branch while the branch is chosen at runtime.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

/// Span for `connect`. `session_id` is recorded once the handshake succeeds.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion; five match arms are inherent"
)]
pub(crate) fn connect_span(config: &TracingConfig, remote: SocketAddr) -> Span {
    dynamic_span!(
        config.connect_level,
        "client.connect",
        peer.addr = %remote,
        session_id = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn start_stream_span(config: &TracingConfig, intent: &str) -> Span {
    dynamic_span!(
        config.start_stream_level,
        "client.start_stream",
        intent = intent,
        config_id = tracing::field::Empty
    )
}

/// Span for `send_frame`. The `sequence` field is recorded after the send.
#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn send_frame_span(config: &TracingConfig, channels: usize) -> Span {
    dynamic_span!(
        config.send_frame_level,
        "client.send_frame",
        frame.channels = channels,
        sequence = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn control_span(config: &TracingConfig, op: &str) -> Span {
    dynamic_span!(
        config.control_level,
        "client.control",
        op = op,
        result = tracing::field::Empty
    )
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn close_span(config: &TracingConfig) -> Span {
    dynamic_span!(config.close_level, "client.close")
}

/// Start a timer when timing is enabled for an operation.
pub(crate) fn start_timer(enabled: bool) -> Option<Instant> { enabled.then(Instant::now) }

/// Emit an `elapsed_us` event at `DEBUG` when `start` is set.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}

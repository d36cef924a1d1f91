//! Tracing configuration for ALPINE client operations.
//!
//! [`TracingConfig`] controls the level of the span each client operation
//! opens and whether per-operation elapsed-time events are recorded.

use tracing::Level;

/// Controls tracing span levels and per-operation timing for client calls.
///
/// By default, lifecycle operations (`connect`, `close`) emit spans at
/// `INFO` level. Per-frame and per-request operations (`send_frame`,
/// `control`, `start_stream`) emit spans at `DEBUG` level. Timing is disabled
/// for every operation.
///
/// When timing is enabled for an operation, an event recording `elapsed_us`
/// is emitted inside its span once the operation completes.
///
/// # Examples
///
/// ```
/// use alpine_sdk::client::TracingConfig;
/// use tracing::Level;
///
/// let config = TracingConfig::default()
///     .with_connect_timing(true)
///     .with_send_frame_level(Level::TRACE);
/// let _ = config;
///
/// let verbose = TracingConfig::default()
///     .with_all_levels(Level::TRACE)
///     .with_all_timing(true);
/// let _ = verbose;
/// ```
#[expect(
    clippy::struct_excessive_bools,
    reason = "one independent timing flag per client operation"
)]
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) connect_level: Level,
    pub(crate) start_stream_level: Level,
    pub(crate) send_frame_level: Level,
    pub(crate) control_level: Level,
    pub(crate) close_level: Level,
    pub(crate) connect_timing: bool,
    pub(crate) start_stream_timing: bool,
    pub(crate) send_frame_timing: bool,
    pub(crate) control_timing: bool,
    pub(crate) close_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            connect_level: Level::INFO,
            start_stream_level: Level::DEBUG,
            send_frame_level: Level::DEBUG,
            control_level: Level::DEBUG,
            close_level: Level::INFO,
            connect_timing: false,
            start_stream_timing: false,
            send_frame_timing: false,
            control_timing: false,
            close_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the tracing level for `connect`.
    #[must_use]
    pub fn with_connect_level(mut self, level: Level) -> Self {
        self.connect_level = level;
        self
    }

    /// Enable or disable timing for `connect`.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::TracingConfig;
    ///
    /// let config = TracingConfig::default().with_connect_timing(true);
    /// let _ = config;
    /// ```
    #[must_use]
    pub fn with_connect_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self
    }

    /// Set the tracing level for `start_stream`.
    #[must_use]
    pub fn with_start_stream_level(mut self, level: Level) -> Self {
        self.start_stream_level = level;
        self
    }

    /// Enable or disable timing for `start_stream`.
    #[must_use]
    pub fn with_start_stream_timing(mut self, enabled: bool) -> Self {
        self.start_stream_timing = enabled;
        self
    }

    /// Set the tracing level for `send_frame`.
    #[must_use]
    pub fn with_send_frame_level(mut self, level: Level) -> Self {
        self.send_frame_level = level;
        self
    }

    /// Enable or disable timing for `send_frame`.
    #[must_use]
    pub fn with_send_frame_timing(mut self, enabled: bool) -> Self {
        self.send_frame_timing = enabled;
        self
    }

    /// Set the tracing level for `control`.
    #[must_use]
    pub fn with_control_level(mut self, level: Level) -> Self {
        self.control_level = level;
        self
    }

    /// Enable or disable timing for `control`.
    #[must_use]
    pub fn with_control_timing(mut self, enabled: bool) -> Self {
        self.control_timing = enabled;
        self
    }

    /// Set the tracing level for `close`.
    #[must_use]
    pub fn with_close_level(mut self, level: Level) -> Self {
        self.close_level = level;
        self
    }

    /// Enable or disable timing for `close`.
    #[must_use]
    pub fn with_close_timing(mut self, enabled: bool) -> Self {
        self.close_timing = enabled;
        self
    }

    /// Set the tracing level for all operations at once.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.connect_level = level;
        self.start_stream_level = level;
        self.send_frame_level = level;
        self.control_level = level;
        self.close_level = level;
        self
    }

    /// Enable or disable timing for all operations at once.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self.start_stream_timing = enabled;
        self.send_frame_timing = enabled;
        self.control_timing = enabled;
        self.close_timing = enabled;
        self
    }
}

//! Tracing configuration builder method for [`AlpineClientBuilder`].

use super::AlpineClientBuilder;
use crate::client::tracing_config::TracingConfig;

impl AlpineClientBuilder {
    /// Configure tracing instrumentation for the client.
    ///
    /// Without this call the client uses [`TracingConfig::default()`].
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::{AlpineClientBuilder, TracingConfig};
    ///
    /// let config = TracingConfig::default().with_all_timing(true);
    /// let builder = AlpineClientBuilder::new().tracing_config(config);
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn tracing_config(mut self, config: TracingConfig) -> Self {
        self.tracing_config = config;
        self
    }
}

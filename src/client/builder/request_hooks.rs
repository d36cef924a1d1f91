//! Frame hook methods for `AlpineClientBuilder`.

use std::sync::Arc;

use super::AlpineClientBuilder;

impl AlpineClientBuilder {
    /// Register a hook invoked on each encoded frame before it is sent.
    ///
    /// Hooks run in registration order and may rewrite the datagram.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::{
    ///     Arc,
    ///     atomic::{AtomicUsize, Ordering},
    /// };
    ///
    /// use alpine_sdk::client::AlpineClientBuilder;
    ///
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let count = counter.clone();
    /// let builder = AlpineClientBuilder::new().before_send(move |_bytes: &mut Vec<u8>| {
    ///     count.fetch_add(1, Ordering::Relaxed);
    /// });
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn before_send<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Vec<u8>) + Send + Sync + 'static,
    {
        self.before_send.push(Arc::new(f));
        self
    }
}

//! Lifecycle hook methods for `AlpineClientBuilder`.

use std::{future::Future, sync::Arc};

use uuid::Uuid;

use super::AlpineClientBuilder;
use crate::{client::ClientError, message::SessionEstablished};

impl AlpineClientBuilder {
    /// Register a callback invoked once the handshake established a session.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::AlpineClientBuilder;
    ///
    /// let builder = AlpineClientBuilder::new().on_connection_setup(|established| async move {
    ///     println!("streaming to {}", established.device_identity.device_id);
    /// });
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn on_connection_setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SessionEstablished) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.lifecycle_hooks.on_connect = Some(Arc::new(move |established| Box::pin(f(established))));
        self
    }

    /// Register a callback invoked by [`close`](crate::client::AlpineClient::close)
    /// with the closed session id.
    #[must_use]
    pub fn on_connection_teardown<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Uuid) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.lifecycle_hooks.on_disconnect = Some(Arc::new(move |session_id| Box::pin(f(session_id))));
        self
    }

    /// Register a callback invoked before an error is returned to the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::AlpineClientBuilder;
    ///
    /// let builder = AlpineClientBuilder::new().on_error(|err| {
    ///     let message = err.to_string();
    ///     async move { eprintln!("client error: {message}") }
    /// });
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a ClientError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.lifecycle_hooks.on_error = Some(Arc::new(move |e| Box::pin(f(e))));
        self
    }
}

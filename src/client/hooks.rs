//! Client lifecycle and frame hooks.
//!
//! Lifecycle hooks fire at session boundaries (setup, teardown, error).
//! Frame hooks fire on every outgoing frame after it has been encoded.

use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use super::ClientError;
use crate::message::SessionEstablished;

/// Handler invoked once the handshake has established a session.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use alpine_sdk::client::ClientConnectionSetupHandler;
///
/// let setup: ClientConnectionSetupHandler = Arc::new(|established| {
///     Box::pin(async move {
///         println!("session {} ready", established.session_id);
///     })
/// });
/// ```
pub type ClientConnectionSetupHandler =
    Arc<dyn Fn(SessionEstablished) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handler invoked when the client closes its session.
///
/// The handler receives the identifier of the closed session.
pub type ClientConnectionTeardownHandler =
    Arc<dyn Fn(Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handler invoked when a client operation fails.
///
/// The handler runs before the error is returned to the caller.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use alpine_sdk::client::ClientErrorHandler;
///
/// let error_handler: ClientErrorHandler = Arc::new(|err| {
///     Box::pin(async move {
///         eprintln!("client error: {err}");
///     })
/// });
/// ```
pub type ClientErrorHandler =
    Arc<dyn for<'a> Fn(&'a ClientError) -> BoxFuture<'a, ()> + Send + Sync>;

#[expect(
    clippy::struct_field_names,
    reason = "on_ prefix is idiomatic for callback fields"
)]
#[derive(Clone, Default)]
pub(crate) struct LifecycleHooks {
    pub(crate) on_connect: Option<ClientConnectionSetupHandler>,
    pub(crate) on_disconnect: Option<ClientConnectionTeardownHandler>,
    pub(crate) on_error: Option<ClientErrorHandler>,
}

/// Hook invoked on each encoded frame before it is written to the socket.
///
/// The hook may inspect or rewrite the datagram, e.g. to count bytes or
/// append a trailer understood by the device.
///
/// # Examples
///
/// ```rust
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use alpine_sdk::client::BeforeSendHook;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let count = counter.clone();
/// let hook: BeforeSendHook = Arc::new(move |bytes: &mut Vec<u8>| {
///     count.fetch_add(bytes.len(), Ordering::Relaxed);
/// });
/// ```
pub type BeforeSendHook = Arc<dyn Fn(&mut Vec<u8>) + Send + Sync>;

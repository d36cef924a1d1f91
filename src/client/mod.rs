//! Controller client for ALPINE devices.
//!
//! [`AlpineClient`] authenticates a device, binds a stream profile and sends
//! lighting frames, keeping the session alive in the background. Lifecycle
//! hooks mirror the device's session boundaries so both ends can be
//! instrumented the same way.

mod builder;
mod config;
mod error;
mod hooks;
mod options;
mod runtime;
mod tracing_config;
mod tracing_helpers;

pub use builder::{AlpineClientBuilder, DEFAULT_HANDSHAKE_TIMEOUT, MAX_FRAME_RATE};
pub use config::{MAX_DATAGRAM_SIZE, MIN_DATAGRAM_SIZE, SocketOptions};
pub use error::ClientError;
pub use hooks::{
    BeforeSendHook,
    ClientConnectionSetupHandler,
    ClientConnectionTeardownHandler,
    ClientErrorHandler,
};
pub use options::ConnectOptions;
pub use runtime::AlpineClient;
pub use tracing_config::TracingConfig;

#[cfg(test)]
mod tests;

//! Builder for configuring and connecting an ALPINE client.

mod connect;
mod core;
mod lifecycle;
mod request_hooks;
mod settings;
mod tracing;

pub use core::{AlpineClientBuilder, DEFAULT_HANDSHAKE_TIMEOUT, MAX_FRAME_RATE};

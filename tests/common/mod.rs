//! Shared utilities for integration tests.
//!
//! Builds clients pointed at an [`alpine_testing::TestDevice`] and counts hook
//! invocations.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alpine_sdk::{AlpineClient, AlpineClientBuilder, ClientError};
use alpine_testing::loopback;

/// Handshake timeout used by tests; loopback handshakes finish well within it.
pub const TEST_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// A client builder bound to loopback with test timeouts.
pub fn builder() -> AlpineClientBuilder {
    AlpineClient::builder()
        .local_addr(loopback())
        .handshake_timeout(TEST_HANDSHAKE_TIMEOUT)
        .control_timeout(Duration::from_millis(50))
}

/// Connect a default test client to `device`.
pub async fn connect(device: SocketAddr) -> Result<AlpineClient, ClientError> {
    builder().connect(device).await
}

/// Counter shared between a test and the hooks it registers.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) { self.0.fetch_add(1, Ordering::SeqCst); }

    pub fn get(&self) -> usize { self.0.load(Ordering::SeqCst) }
}

//! Utilities for exercising ALPINE clients and devices in tests.
//!
//! The helpers spawn a [`DeviceServer`](alpine_sdk::DeviceServer) on a
//! loopback port, capture log output and snapshot metrics so integration
//! tests can focus on assertions.
//!
//! ```rust,no_run
//! use alpine_testing::{TestDevice, TestResult};
//!
//! # async fn demo() -> TestResult {
//! let device = TestDevice::spawn().await?;
//! let client = alpine_sdk::AlpineClient::builder()
//!     .local_addr(alpine_testing::loopback())
//!     .connect(device.addr)
//!     .await?;
//! client.close().await;
//! device.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod logging;
pub mod macros;
pub mod metrics;

use std::net::{Ipv4Addr, SocketAddr};

use alpine_sdk::{CapabilitySet, DeviceIdentity};
pub use device::TestDevice;
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup, gauge_value};

/// Result type for tests that propagate errors with `?`.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// An ephemeral loopback address.
#[must_use]
pub fn loopback() -> SocketAddr { SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0) }

/// Identity for a test peer named `model`.
#[must_use]
pub fn identity(model: &str) -> DeviceIdentity { DeviceIdentity::generate("alpine-test", model) }

/// Capabilities accepting both channel formats.
#[must_use]
pub fn wide_capabilities() -> CapabilitySet {
    CapabilitySet {
        channel_formats: vec![alpine_sdk::ChannelFormat::U8, alpine_sdk::ChannelFormat::U16],
        grouping_supported: true,
        ..CapabilitySet::default()
    }
}

//! Loopback device harness.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use alpine_sdk::{CapabilitySet, DeviceServer, ReceivedFrame, SessionRegistry};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{TestResult, identity, loopback};

/// How long [`TestDevice::next_frame`] waits before giving up.
pub const FRAME_WAIT: Duration = Duration::from_secs(2);

/// A [`DeviceServer`] running on a loopback port.
pub struct TestDevice {
    pub addr: SocketAddr,
    pub sessions: Arc<SessionRegistry>,
    frames: mpsc::Receiver<ReceivedFrame>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestDevice {
    /// Spawn a device with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the loopback socket cannot be bound.
    pub async fn spawn() -> io::Result<Self> { Self::spawn_with(|device| device).await }

    /// Spawn a device after applying `configure` to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the loopback socket cannot be bound.
    pub async fn spawn_with<F>(configure: F) -> io::Result<Self>
    where
        F: FnOnce(DeviceServer) -> DeviceServer,
    {
        Self::start(CapabilitySet::default(), configure).await
    }

    /// Spawn a device advertising `capabilities`.
    ///
    /// # Errors
    ///
    /// Returns an error if the loopback socket cannot be bound.
    pub async fn spawn_advertising(capabilities: CapabilitySet) -> io::Result<Self> {
        Self::start(capabilities, |device| device).await
    }

    async fn start<F>(capabilities: CapabilitySet, configure: F) -> io::Result<Self>
    where
        F: FnOnce(DeviceServer) -> DeviceServer,
    {
        let device = configure(DeviceServer::bind(loopback(), identity("device"), capabilities).await?);
        let addr = device.local_addr()?;
        let sessions = device.sessions();
        let (frames_tx, frames) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(device.serve(frames_tx, shutdown.clone()));
        Ok(Self {
            addr,
            sessions,
            frames,
            shutdown,
            handle,
        })
    }

    /// Next frame delivered by the device, or `None` after [`FRAME_WAIT`].
    pub async fn next_frame(&mut self) -> Option<ReceivedFrame> {
        time::timeout(FRAME_WAIT, self.frames.recv()).await.ok().flatten()
    }

    /// Stop the device and wait for its task to finish.
    ///
    /// # Errors
    ///
    /// Returns the join error if the device task panicked.
    pub async fn shutdown(self) -> TestResult {
        self.shutdown.cancel();
        self.handle.await?;
        Ok(())
    }
}

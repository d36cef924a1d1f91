//! Periodic keepalive task.

use std::time::Duration;

use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    message::{Keepalive, Packet},
    session::AlnpSession,
    transport::PacketTransport,
};

/// Default interval between keepalives.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn a task sending [`Keepalive`] every `interval` until `shutdown` fires.
///
/// The task owns `transport` and only sends on it, so keepalives keep leaving
/// while a control request waits for its acknowledgement. The first keepalive
/// leaves one interval after spawning. A send failure is logged and fails the
/// session, ending the task.
pub fn spawn_keepalive<T>(
    mut transport: T,
    interval: Duration,
    session: AlnpSession,
    session_id: Uuid,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    T: PacketTransport + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let result = transport
                        .send(Packet::Keepalive(Keepalive { session_id }))
                        .await;
                    if let Err(err) = result {
                        tracing::warn!(%session_id, error = %err, "keepalive failed");
                        session.fail(format!("keepalive failed: {err}"));
                        break;
                    }
                    session.update_keepalive();
                    tracing::trace!(%session_id, "keepalive sent");
                }
            }
        }
    })
}

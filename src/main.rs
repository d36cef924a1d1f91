//! `alpine` binary: run a device, discover devices or stream frames.

mod cli;

use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use alpine_sdk::{
    AlpineClient,
    CapabilitySet,
    ChallengeAuthenticator,
    ChannelFormat,
    DeviceIdentity,
    DeviceServer,
    DiscoveryClient,
    Frame,
    StaticKeyAuthenticator,
    StreamProfile,
};
use clap::Parser;
use cli::{Cli, Command, ProfileArg};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Device { bind, secret } => run_device(bind, secret).await,
        Command::Discover {
            broadcast,
            bind,
            timeout_ms,
            secret,
        } => run_discover(broadcast, bind, timeout_ms, secret).await,
        Command::Send {
            remote,
            bind,
            profile,
            channels,
            count,
            interval_ms,
            secret,
        } => {
            let frame = Frame::new(ChannelFormat::U8, channels);
            let profile = match profile {
                ProfileArg::Auto => StreamProfile::auto(),
                ProfileArg::Realtime => StreamProfile::realtime(),
                ProfileArg::Install => StreamProfile::install(),
            };
            let mut client = AlpineClient::builder()
                .local_addr(bind)
                .authenticator(authenticator(secret))
                .connect(remote)
                .await?;
            let config_id = client.start_stream(profile)?;
            println!("streaming to {remote} with config {config_id}");
            for _ in 0..count {
                client.send_frame(frame.clone()).await?;
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
            client.close().await;
            Ok(())
        }
    }
}

fn authenticator(secret: Option<String>) -> Arc<dyn ChallengeAuthenticator> {
    match secret {
        Some(secret) => Arc::new(StaticKeyAuthenticator::new(secret.into_bytes())),
        None => Arc::new(StaticKeyAuthenticator::default()),
    }
}

async fn run_device(bind: SocketAddr, secret: Option<String>) -> Result<(), BoxError> {
    let device = DeviceServer::bind(
        bind,
        DeviceIdentity::generate("alpine", "cli-device"),
        CapabilitySet::default(),
    )
    .await?
    .with_authenticator(authenticator(secret));
    println!("device listening on {}", device.local_addr()?);

    let (frames_tx, mut frames_rx) = mpsc::channel(64);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(device.serve(frames_tx, shutdown.clone()));

    loop {
        tokio::select! {
            received = frames_rx.recv() => {
                let Some(received) = received else { break };
                println!(
                    "{} seq={} channels={:?} loss={:.2}",
                    received.peer,
                    received.envelope.sequence,
                    received.envelope.channels,
                    received.network.loss_ratio
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                shutdown.cancel();
                break;
            }
        }
    }
    server.await?;
    Ok(())
}

async fn run_discover(
    broadcast: SocketAddr,
    bind: SocketAddr,
    timeout_ms: u64,
    secret: Option<String>,
) -> Result<(), BoxError> {
    let mut client = DiscoveryClient::new(bind, broadcast, Vec::new(), Duration::from_millis(timeout_ms));
    if let Some(secret) = secret {
        client = client.with_verifier(authenticator(Some(secret)));
    }
    for device in client.discover().await? {
        println!(
            "{} {} {}/{} signed={}",
            device.addr,
            device.identity.device_id,
            device.identity.manufacturer_id,
            device.identity.model_id,
            device.signed
        );
    }
    Ok(())
}

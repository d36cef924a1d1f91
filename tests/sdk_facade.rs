//! The SDK facade delegates to a real client without changing behaviour.

use alpine_sdk::{
    AlpineClient,
    ChannelFormat,
    ClientError,
    ConnectOptions,
    Frame,
    FrameClient,
    HandshakeError,
    SdkClient,
    StreamProfile,
    TransportError,
};
use alpine_testing::{TestDevice, TestResult, loopback, recv_expect};
use tokio::net::UdpSocket;

mod common;

fn options(remote: std::net::SocketAddr) -> ConnectOptions {
    let mut options = ConnectOptions::new(remote);
    options.local_addr = loopback();
    options.handshake_timeout = common::TEST_HANDSHAKE_TIMEOUT;
    options
}

async fn send_through<C>(client: &C, frame: C::Frame) -> C::Output
where
    C: FrameClient,
{
    client.send_frame(frame).await
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn facade_streams_like_the_client() -> TestResult {
    let mut device = TestDevice::spawn().await?;
    let mut sdk = SdkClient::<AlpineClient>::connect(options(device.addr)).await?;
    let config_id = sdk.start_stream(StreamProfile::realtime())?;

    sdk.send_frame(Frame::new(ChannelFormat::U8, vec![1, 2])).await?;
    send_through(&sdk, Frame::new(ChannelFormat::U8, vec![3, 4])).await?;
    send_through(sdk.inner(), Frame::new(ChannelFormat::U8, vec![5, 6])).await?;

    let mut sequences = Vec::new();
    for _ in 0..3 {
        let received = recv_expect!(device);
        assert_eq!(received.envelope.config_id, config_id);
        sequences.push(received.envelope.sequence);
    }
    assert_eq!(sequences, vec![1, 2, 3]);

    let ack = sdk.control(alpine_sdk::ControlOp::Identify, Vec::new()).await?;
    assert!(ack.ok);

    sdk.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn facade_surfaces_client_errors_unchanged() -> TestResult {
    let silent = UdpSocket::bind(loopback()).await?;
    let mut options = options(silent.local_addr()?);
    options.handshake_timeout = std::time::Duration::from_millis(30);

    let result = SdkClient::<AlpineClient>::connect(options).await;
    assert!(matches!(
        result,
        Err(ClientError::Handshake(HandshakeError::Transport(
            TransportError::Timeout
        )))
    ));

    let device = TestDevice::spawn().await?;
    let sdk = SdkClient::from(common::connect(device.addr).await?);
    let result = sdk.send_frame(Frame::new(ChannelFormat::U8, vec![1])).await;
    assert!(matches!(result, Err(ClientError::StreamNotStarted)));

    sdk.into_inner().close().await;
    device.shutdown().await?;
    Ok(())
}

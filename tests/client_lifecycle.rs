#![expect(
    clippy::excessive_nesting,
    reason = "async closures within builder patterns are inherently nested"
)]
//! Integration tests for client connection lifecycle callbacks and stream
//! preconditions.

use std::sync::{Arc, Mutex};

use alpine_sdk::{
    CapabilitySet,
    ChannelFormat,
    ClientError,
    Frame,
    HandshakeError,
    SessionStateError,
    StaticKeyAuthenticator,
    StreamProfile,
};
use alpine_testing::{TestDevice, TestResult, wide_capabilities};
use rstest::rstest;
use uuid::Uuid;

mod common;
use common::Counter;

/// Setup and teardown callbacks both run, and see the same session.
#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn setup_and_teardown_callbacks_run() -> TestResult {
    let device = TestDevice::spawn().await?;
    let setup_ids = Arc::new(Mutex::new(Vec::<Uuid>::new()));
    let teardown_ids = Arc::new(Mutex::new(Vec::<Uuid>::new()));
    let setup = setup_ids.clone();
    let teardown = teardown_ids.clone();

    let client = common::builder()
        .on_connection_setup(move |established| {
            let setup = setup.clone();
            async move {
                setup.lock().expect("setup ids").push(established.session_id);
            }
        })
        .on_connection_teardown(move |session_id| {
            let teardown = teardown.clone();
            async move {
                teardown.lock().expect("teardown ids").push(session_id);
            }
        })
        .connect(device.addr)
        .await?;

    assert_eq!(setup_ids.lock().expect("setup ids").len(), 1);
    assert!(teardown_ids.lock().expect("teardown ids").is_empty());

    client.close().await;

    let setup = setup_ids.lock().expect("setup ids").clone();
    let teardown = teardown_ids.lock().expect("teardown ids").clone();
    assert_eq!(setup, teardown, "teardown should receive the setup session id");

    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn sending_before_start_stream_fails_and_reports() -> TestResult {
    let device = TestDevice::spawn().await?;
    let errors = Counter::default();
    let count = errors.clone();

    let client = common::builder()
        .on_error(move |_err| {
            let count = count.clone();
            async move { count.bump() }
        })
        .connect(device.addr)
        .await?;

    let result = client.send_frame(Frame::new(ChannelFormat::U8, vec![1])).await;
    assert!(matches!(result, Err(ClientError::StreamNotStarted)));
    assert_eq!(errors.get(), 1, "error hook should see the rejected frame");

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn profile_is_locked_once_streaming() -> TestResult {
    let device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;

    let first = client.start_stream(StreamProfile::realtime())?;
    let second = client.start_stream(StreamProfile::install());
    assert!(matches!(
        second,
        Err(ClientError::Handshake(HandshakeError::Session(
            SessionStateError::ProfileLocked
        )))
    ));
    assert_eq!(client.config_id(), Some(first));

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn failed_session_refuses_stream_without_binding_profile() -> TestResult {
    let device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    client.session().fail("link lost");

    let result = client.start_stream(StreamProfile::auto());
    assert!(matches!(
        result,
        Err(ClientError::Handshake(HandshakeError::Session(
            SessionStateError::Failed(ref reason)
        ))) if reason == "link lost"
    ));
    assert_eq!(client.config_id(), None);
    assert!(client.adaptation().is_none());

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn invalid_profile_is_rejected() -> TestResult {
    let device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;

    let result = client.start_stream(StreamProfile::with_weights(
        alpine_sdk::StreamIntent::Auto,
        0,
        0,
    ));
    assert!(matches!(result, Err(ClientError::Profile(_))));
    assert_eq!(client.config_id(), None);

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn mismatched_secret_fails_authentication() -> TestResult {
    let device = TestDevice::spawn_with(|device| {
        device.with_authenticator(Arc::new(StaticKeyAuthenticator::new(b"device-secret".to_vec())))
    })
    .await?;

    let result = common::builder()
        .authenticator(Arc::new(StaticKeyAuthenticator::new(b"other-secret".to_vec())))
        .connect(device.addr)
        .await;
    assert!(matches!(
        result,
        Err(ClientError::Handshake(HandshakeError::Authentication(_)))
    ));
    assert!(device.sessions.is_empty());

    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn shared_secret_connects() -> TestResult {
    let secret = b"stage-left".to_vec();
    let device_secret = secret.clone();
    let device = TestDevice::spawn_with(move |device| {
        device.with_authenticator(Arc::new(StaticKeyAuthenticator::new(device_secret)))
    })
    .await?;

    let client = common::builder()
        .authenticator(Arc::new(StaticKeyAuthenticator::new(secret)))
        .connect(device.addr)
        .await?;
    assert_eq!(device.sessions.len(), 1);

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[rstest]
#[case(CapabilitySet::default(), vec![ChannelFormat::U8], false)]
#[case(wide_capabilities(), vec![ChannelFormat::U8, ChannelFormat::U16], true)]
#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn session_carries_negotiated_capabilities(
    #[case] controller: CapabilitySet,
    #[case] formats: Vec<ChannelFormat>,
    #[case] grouping: bool,
) -> TestResult {
    let device = TestDevice::spawn_advertising(wide_capabilities()).await?;
    let client = common::builder()
        .capabilities(controller)
        .connect(device.addr)
        .await?;

    let established = client.session().established().ok_or("session not established")?;
    assert_eq!(established.capabilities.channel_formats, formats);
    assert_eq!(established.capabilities.grouping_supported, grouping);
    assert_eq!(established.device_identity.model_id, "device");

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

//! End-to-end streaming between a client and a loopback device.

use std::time::Duration;

use alpine_sdk::{
    ChannelFormat,
    Frame,
    NetworkConditions,
    RecoveryEvent,
    RecoveryReason,
    SessionState,
    StreamProfile,
    stream::RECOVERY_METADATA_KEY,
};
use alpine_testing::{TestDevice, TestResult, recv_expect};

mod common;

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn frames_arrive_in_sequence_with_session_and_config() -> TestResult {
    let mut device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    let config_id = client.start_stream(StreamProfile::realtime())?;
    let session_id = client
        .session()
        .established()
        .map(|established| established.session_id)
        .ok_or("session not established")?;

    for value in 1..=5u16 {
        client
            .send_frame(Frame::new(ChannelFormat::U8, vec![value, value * 2]))
            .await?;
    }

    for expected in 1..=5u64 {
        let received = recv_expect!(device);
        assert_eq!(received.envelope.sequence, expected);
        assert_eq!(received.envelope.session_id, session_id);
        assert_eq!(received.envelope.config_id, config_id);
        assert_eq!(received.peer, client.local_addr());
    }
    assert_eq!(client.session().state().name(), "streaming");

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn empty_frame_repeats_last_channels_on_latency_profile() -> TestResult {
    let mut device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    client.start_stream(StreamProfile::auto())?;

    client
        .send_frame(Frame::new(ChannelFormat::U8, vec![10, 20, 30]))
        .await?;
    client.send_frame(Frame::new(ChannelFormat::U8, Vec::new())).await?;

    let first = recv_expect!(device);
    let second = recv_expect!(device);
    assert_eq!(first.envelope.channels, vec![10, 20, 30]);
    assert_eq!(second.envelope.channels, first.envelope.channels);

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn frame_metadata_and_groups_reach_the_device() -> TestResult {
    let mut device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    client.start_stream(StreamProfile::realtime())?;

    let frame = Frame::new(ChannelFormat::U16, vec![1000, 2000])
        .with_priority(7)
        .with_group("wash", vec![0, 1])
        .with_metadata("scene", "intro");
    client.send_frame(frame).await?;

    let received = recv_expect!(device);
    assert_eq!(received.envelope.priority, 7);
    assert_eq!(received.envelope.channel_format, ChannelFormat::U16);
    assert_eq!(
        received.envelope.groups.as_ref().and_then(|groups| groups.get("wash")),
        Some(&vec![0, 1])
    );
    assert_eq!(
        received
            .envelope
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("scene"))
            .map(String::as_str),
        Some("intro")
    );
    assert!(received.network.loss_ratio.abs() < f64::EPSILON);

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn close_removes_session_from_device() -> TestResult {
    let device = TestDevice::spawn().await?;
    let client = common::connect(device.addr).await?;
    let local = client.local_addr();
    assert_eq!(device.sessions.active_peers(), vec![local]);

    let session = client.session().clone();
    client.close().await;
    assert_eq!(session.state(), SessionState::Closed);

    tokio::time::timeout(Duration::from_secs(2), async {
        while !device.sessions.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    device.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn paused_stream_rejects_frames() -> TestResult {
    let device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    client.start_stream(StreamProfile::realtime())?;

    client.session().set_streaming_enabled(false);
    let result = client.send_frame(Frame::new(ChannelFormat::U8, vec![1])).await;
    assert!(matches!(
        result,
        Err(alpine_sdk::ClientError::Stream(
            alpine_sdk::StreamError::StreamingDisabled
        ))
    ));

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

fn conditions(arrivals: &[(u64, u64)]) -> NetworkConditions {
    let mut conditions = NetworkConditions::new();
    for &(sequence, arrival_us) in arrivals {
        conditions.record_frame(sequence, arrival_us, arrival_us);
    }
    conditions
}

#[tokio::test]
#[expect(
    clippy::panic_in_result_fn,
    reason = "asserts provide clearer diagnostics in tests"
)]
async fn observed_conditions_drive_adaptation_and_recovery() -> TestResult {
    let mut device = TestDevice::spawn().await?;
    let mut client = common::connect(device.addr).await?;
    let jittery = conditions(&[(1, 0), (2, 1_000), (3, 22_000), (4, 23_000), (5, 44_000)]);
    let lossy = conditions(&[(1, 0), (6, 1_000)]);
    let steady = conditions(&[(1, 0), (2, 1_000), (3, 2_000), (4, 3_000)]);

    assert_eq!(client.observe_network_conditions(&lossy), None);
    assert!(client.adaptation().is_none());

    client.start_stream(StreamProfile::auto())?;
    let baseline = client.adaptation().ok_or("stream started")?.settings();
    assert_eq!(client.observe_network_conditions(&jittery), None);
    let adapted = client.adaptation().ok_or("stream started")?.settings();
    assert!(adapted.deadline_offset_ms < baseline.deadline_offset_ms);

    assert_eq!(
        client.observe_network_conditions(&lossy),
        Some(RecoveryEvent::RecoveryStarted(RecoveryReason::BurstLoss))
    );
    client
        .send_frame(Frame::new(ChannelFormat::U8, vec![1, 2]))
        .await?;
    let received = recv_expect!(device);
    let metadata = received.envelope.metadata.ok_or("recovery metadata")?;
    assert_eq!(
        metadata.get(RECOVERY_METADATA_KEY).map(String::as_str),
        Some("burst_loss")
    );

    assert_eq!(
        client.observe_network_conditions(&steady),
        Some(RecoveryEvent::RecoveryComplete(RecoveryReason::BurstLoss))
    );
    client
        .send_frame(Frame::new(ChannelFormat::U8, vec![3, 4]))
        .await?;
    assert_eq!(recv_expect!(device).envelope.metadata, None);

    client.close().await;
    device.shutdown().await?;
    Ok(())
}

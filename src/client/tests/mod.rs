//! Unit tests for the ALPINE client runtime.


use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rstest::rstest;
use tokio::net::UdpSocket;

use super::{config::clamp_datagram_size, *};
use crate::{
    handshake::HandshakeError,
    transport::{DEFAULT_MAX_DATAGRAM_SIZE, TransportError},
};

#[rstest]
#[case(1, MIN_DATAGRAM_SIZE)]
#[case(MIN_DATAGRAM_SIZE, MIN_DATAGRAM_SIZE)]
#[case(1500, 1500)]
#[case(MAX_DATAGRAM_SIZE + 1, MAX_DATAGRAM_SIZE)]
fn datagram_size_is_clamped(#[case] input: usize, #[case] expected: usize) {
    assert_eq!(clamp_datagram_size(input), expected);
    assert_eq!(
        AlpineClientBuilder::new()
            .max_datagram_size(input)
            .max_datagram_size_value(),
        expected
    );
}

#[test]
fn builder_defaults_match_device_limits() {
    let builder = AlpineClientBuilder::default();
    assert_eq!(builder.max_datagram_size_value(), DEFAULT_MAX_DATAGRAM_SIZE);
    assert_eq!(builder.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
    assert_eq!(builder.frame_rate_value(), None);
}

#[rstest]
#[case(0, 1)]
#[case(44, 44)]
#[case(MAX_FRAME_RATE * 2, MAX_FRAME_RATE)]
fn frame_rate_is_clamped(#[case] input: usize, #[case] expected: usize) {
    assert_eq!(
        AlpineClientBuilder::new().frame_rate(input).frame_rate_value(),
        Some(expected)
    );
}

#[tokio::test]
async fn socket_options_apply_broadcast() {
    let socket = SocketOptions::default()
        .broadcast(true)
        .ttl(3)
        .bind(([127, 0, 0, 1], 0).into())
        .expect("bind socket");
    assert!(socket.broadcast().expect("read broadcast"));
    assert_eq!(socket.ttl().expect("read ttl"), 3);
}

#[tokio::test]
async fn connect_times_out_and_invokes_error_hook() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.expect("bind silent peer");
    let remote = silent.local_addr().expect("silent addr");
    let errors = Arc::new(AtomicUsize::new(0));
    let count = errors.clone();

    let result = AlpineClient::builder()
        .local_addr(([127, 0, 0, 1], 0).into())
        .handshake_timeout(Duration::from_millis(50))
        .on_error(move |_err| {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .connect(remote)
        .await;

    assert!(matches!(
        result,
        Err(ClientError::Handshake(HandshakeError::Transport(
            TransportError::Timeout
        )))
    ));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

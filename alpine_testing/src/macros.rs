//! Assertion macros shared by test helpers and integration tests.

/// Await a fallible future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! await_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("operation failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await the next frame from a [`TestDevice`](crate::TestDevice) and panic if
/// none arrives in time.
#[macro_export]
macro_rules! recv_expect {
    ($device:expr) => {{
        $device
            .next_frame()
            .await
            .expect(concat!("no frame received at ", file!(), ":", line!()))
    }};
    ($device:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $device.next_frame().await.expect(&m)
    }};
}

pub use crate::{await_expect, recv_expect};

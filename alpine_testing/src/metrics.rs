//! Helpers for asserting on metrics recorded by `alpine-sdk`.
//!
//! These wrap `metrics_util::debugging::DebuggingRecorder` so tests can
//! install a local recorder and read back a single counter or gauge.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Creates a debugging recorder and snapshotter for metrics testing.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Value of the counter `name`, optionally restricted to the label pair
/// `label`. Returns `None` when nothing was recorded.
#[must_use]
pub fn counter_value(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            if key.key().name() != name {
                return None;
            }
            if let Some((label_key, label_value)) = label {
                if !key
                    .key()
                    .labels()
                    .any(|l| l.key() == label_key && l.value() == label_value)
                {
                    return None;
                }
            }
            match value {
                DebugValue::Counter(count) => Some(count),
                _ => None,
            }
        })
}

/// Value of the gauge `name`, or `None` when it was never touched.
#[must_use]
pub fn gauge_value(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Gauge(gauge) if key.key().name() == name => Some(gauge.into_inner()),
            _ => None,
        })
}

//! Loss, lateness and jitter tracking for a received stream.
//!
//! Callers feed every arrival into [`NetworkConditions::record_frame`] with the
//! frame sequence, its arrival time and its delivery deadline (both in
//! microseconds). The tracker is deterministic: metrics depend only on those
//! inputs.

/// Snapshot produced by [`NetworkConditions::metrics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkMetrics {
    /// Fraction of expected frames that never arrived, in `[0, 1]`.
    pub loss_ratio: f64,
    /// Fraction of received frames that missed their deadline.
    pub late_frame_rate: f64,
    /// Mean variation between consecutive inter-arrival intervals.
    pub jitter_ms: Option<f64>,
}

/// Per-session arrival tracker.
#[derive(Clone, Debug, Default)]
pub struct NetworkConditions {
    last_sequence: Option<u64>,
    total_expected: u64,
    observed_frames: u64,
    lost_frames: u64,
    late_frames: u64,
    last_arrival: Option<u64>,
    last_interval: Option<u64>,
    total_jitter_us: u128,
    jitter_samples: u64,
    max_loss_gap: u64,
}

impl NetworkConditions {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Record one arrival. Duplicate and out-of-order sequences are ignored.
    pub fn record_frame(&mut self, sequence: u64, arrival_us: u64, deadline_us: u64) {
        match self.last_sequence {
            Some(last) if sequence <= last => return,
            Some(last) => {
                let delta = sequence - last;
                self.total_expected = self.total_expected.saturating_add(delta);
                if delta > 1 {
                    self.lost_frames = self.lost_frames.saturating_add(delta - 1);
                    self.max_loss_gap = self.max_loss_gap.max(delta - 1);
                }
            }
            None => self.total_expected = self.total_expected.saturating_add(1),
        }
        self.last_sequence = Some(sequence);
        self.observed_frames = self.observed_frames.saturating_add(1);

        if arrival_us > deadline_us {
            self.late_frames = self.late_frames.saturating_add(1);
        }

        if let Some(last) = self.last_arrival {
            let interval = arrival_us.saturating_sub(last);
            if let Some(prev) = self.last_interval {
                self.total_jitter_us = self
                    .total_jitter_us
                    .saturating_add(u128::from(interval.abs_diff(prev)));
                self.jitter_samples = self.jitter_samples.saturating_add(1);
            }
            self.last_interval = Some(interval);
        }
        self.last_arrival = Some(arrival_us);
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "ratios tolerate rounding on astronomically large counters"
    )]
    #[must_use]
    pub fn metrics(&self) -> NetworkMetrics {
        let expected = self.total_expected.max(self.observed_frames);
        let loss_ratio = if expected == 0 {
            0.0
        } else {
            self.lost_frames as f64 / expected as f64
        };
        let late_frame_rate = if self.observed_frames == 0 {
            0.0
        } else {
            self.late_frames as f64 / self.observed_frames as f64
        };
        let jitter_ms = (self.jitter_samples > 0)
            .then(|| self.total_jitter_us as f64 / self.jitter_samples as f64 / 1000.0);
        NetworkMetrics {
            loss_ratio,
            late_frame_rate,
            jitter_ms,
        }
    }

    /// Largest run of consecutive missing sequences seen so far.
    #[must_use]
    pub const fn max_loss_gap(&self) -> u64 { self.max_loss_gap }

    /// Frames recorded, excluding ignored duplicates.
    #[must_use]
    pub const fn observed_frames(&self) -> u64 { self.observed_frames }
}

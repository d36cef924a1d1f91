//! Keyframe cadence, delta depth and deadline adaptation.
//!
//! [`AdaptationState::decide`] is a pure step function: given the receiver's
//! [`NetworkConditions`] and the active recovery reason it returns the next
//! state and at most one [`AdaptationEvent`]. Every adjustment stays inside
//! the bounds of the profile's [`StreamIntent`]; a move that would leave them
//! parks the stream in degraded-safe mode until conditions clear.

use super::{network::NetworkConditions, recovery::RecoveryReason};
use crate::profile::StreamIntent;

/// Decisions between adjustments.
const DWELL_FRAMES: u32 = 8;

const LOSS_THRESHOLD_KEYFRAME: f64 = 0.30;
const LOSS_THRESHOLD_CLEAR: f64 = 0.50;
const LOSS_THRESHOLD_DEGRADE: f64 = 0.60;
const LATE_THRESHOLD_DELTA: f64 = 0.20;
const JITTER_THRESHOLD_DELTA_MS: f64 = 5.0;
const JITTER_TIGHTEN_MS: f64 = 8.0;
const JITTER_RELAX_MS: f64 = 3.0;
const BURST_THRESHOLD_KEYFRAME: u64 = 5;
const BURST_THRESHOLD_DISABLE: u64 = 8;
const BURST_THRESHOLD_DEGRADE: u64 = 10;
const DEADLINE_STEP_MS: i16 = 10;

/// Tunable stream settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdaptationSettings {
    /// Frames between keyframes.
    pub keyframe_interval: u8,
    /// Deltas allowed between keyframes; `0` disables delta frames.
    pub delta_depth: u8,
    /// Shift applied to the frame delivery deadline.
    pub deadline_offset_ms: i16,
}

/// Limits an intent places on [`AdaptationSettings`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdaptationBounds {
    pub min_keyframe_interval: u8,
    pub min_delta_depth: u8,
    pub min_deadline_offset_ms: i16,
    pub max_deadline_offset_ms: i16,
    /// Settings a fresh stream starts from.
    pub baseline: AdaptationSettings,
}

impl AdaptationBounds {
    #[must_use]
    pub const fn for_intent(intent: StreamIntent) -> Self {
        match intent {
            StreamIntent::Auto => Self {
                min_keyframe_interval: 6,
                min_delta_depth: 1,
                min_deadline_offset_ms: -15,
                max_deadline_offset_ms: 15,
                baseline: AdaptationSettings {
                    keyframe_interval: 10,
                    delta_depth: 3,
                    deadline_offset_ms: 0,
                },
            },
            StreamIntent::Realtime => Self {
                min_keyframe_interval: 8,
                min_delta_depth: 1,
                min_deadline_offset_ms: -20,
                max_deadline_offset_ms: 0,
                baseline: AdaptationSettings {
                    keyframe_interval: 12,
                    delta_depth: 2,
                    deadline_offset_ms: 0,
                },
            },
            StreamIntent::Install => Self {
                min_keyframe_interval: 4,
                min_delta_depth: 0,
                min_deadline_offset_ms: -10,
                max_deadline_offset_ms: 25,
                baseline: AdaptationSettings {
                    keyframe_interval: 8,
                    delta_depth: 3,
                    deadline_offset_ms: 0,
                },
            },
        }
    }

    const fn admits(&self, settings: AdaptationSettings) -> bool {
        settings.keyframe_interval >= self.min_keyframe_interval
            && settings.delta_depth >= self.min_delta_depth
            && settings.deadline_offset_ms >= self.min_deadline_offset_ms
            && settings.deadline_offset_ms <= self.max_deadline_offset_ms
    }
}

/// Why a stream entered degraded-safe mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegradedReason {
    /// The next adjustment would leave the intent's bounds.
    ExceededProfileBounds,
    /// Loss is too heavy for any adjustment to help.
    UnrecoverableBurst,
}

/// Change reported by [`AdaptationState::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdaptationEvent {
    KeyframeCadenceIncreased,
    DeltaDepthReduced,
    DeltaDisabled,
    DeadlineAdjusted,
    EnteredDegradedSafe(DegradedReason),
    ExitedDegradedSafe,
}

impl AdaptationEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeyframeCadenceIncreased => "keyframe_cadence_increased",
            Self::DeltaDepthReduced => "delta_depth_reduced",
            Self::DeltaDisabled => "delta_disabled",
            Self::DeadlineAdjusted => "deadline_adjusted",
            Self::EnteredDegradedSafe(DegradedReason::ExceededProfileBounds) => {
                "degraded_safe_bounds"
            }
            Self::EnteredDegradedSafe(DegradedReason::UnrecoverableBurst) => "degraded_safe_burst",
            Self::ExitedDegradedSafe => "degraded_safe_cleared",
        }
    }
}

/// Adaptation state of one stream.
///
/// # Examples
///
/// ```
/// use alpine_sdk::{NetworkConditions, StreamIntent, stream::AdaptationState};
///
/// let state = AdaptationState::baseline(StreamIntent::Realtime);
/// let mut lossy = NetworkConditions::new();
/// lossy.record_frame(1, 0, 0);
/// lossy.record_frame(2, 1_000, 0);
/// lossy.record_frame(10, 2_000, 0);
///
/// let (next, event) = state.decide(&lossy, None);
/// assert!(event.is_some());
/// assert!(next.settings().keyframe_interval < state.settings().keyframe_interval);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdaptationState {
    intent: StreamIntent,
    settings: AdaptationSettings,
    frames_in_state: u32,
    degraded_safe: bool,
    last_safe: Option<AdaptationSettings>,
}

impl AdaptationState {
    /// Starting state for `intent`. The first decision may adjust immediately.
    #[must_use]
    pub const fn baseline(intent: StreamIntent) -> Self {
        Self {
            intent,
            settings: AdaptationBounds::for_intent(intent).baseline,
            frames_in_state: DWELL_FRAMES,
            degraded_safe: false,
            last_safe: None,
        }
    }

    #[must_use]
    pub const fn intent(&self) -> StreamIntent { self.intent }

    #[must_use]
    pub const fn settings(&self) -> AdaptationSettings { self.settings }

    #[must_use]
    pub const fn is_degraded_safe(&self) -> bool { self.degraded_safe }

    /// Decisions taken since the last change.
    #[must_use]
    pub const fn frames_in_state(&self) -> u32 { self.frames_in_state }

    /// Compute the next state from `conditions` and the active recovery
    /// reason.
    #[must_use]
    pub fn decide(
        &self,
        conditions: &NetworkConditions,
        recovery: Option<RecoveryReason>,
    ) -> (Self, Option<AdaptationEvent>) {
        let mut next = self.clone();
        next.frames_in_state = next.frames_in_state.saturating_add(1);
        let bounds = AdaptationBounds::for_intent(self.intent);
        let metrics = conditions.metrics();
        let gap = conditions.max_loss_gap();

        if self.degraded_safe {
            if metrics.loss_ratio <= LOSS_THRESHOLD_CLEAR
                && gap <= BURST_THRESHOLD_DISABLE
                && recovery.is_none()
            {
                if let Some(settings) = self.last_safe {
                    next.settings = settings;
                }
                next.degraded_safe = false;
                next.frames_in_state = 0;
                return (next, Some(AdaptationEvent::ExitedDegradedSafe));
            }
            return (next, None);
        }

        if metrics.loss_ratio >= LOSS_THRESHOLD_DEGRADE && gap >= BURST_THRESHOLD_DEGRADE {
            return self.degrade(next, DegradedReason::UnrecoverableBurst);
        }
        if next.frames_in_state < DWELL_FRAMES {
            return (next, None);
        }

        let jitter_ms = metrics.jitter_ms.unwrap_or(0.0);
        let current = self.settings;
        let (candidate, event) = if gap >= BURST_THRESHOLD_DISABLE
            && recovery == Some(RecoveryReason::BurstLoss)
            && current.delta_depth > bounds.min_delta_depth
        {
            (
                AdaptationSettings {
                    delta_depth: 0,
                    ..current
                },
                AdaptationEvent::DeltaDisabled,
            )
        } else if metrics.loss_ratio >= LOSS_THRESHOLD_KEYFRAME || gap >= BURST_THRESHOLD_KEYFRAME {
            (
                AdaptationSettings {
                    keyframe_interval: current.keyframe_interval.saturating_sub(1),
                    ..current
                },
                AdaptationEvent::KeyframeCadenceIncreased,
            )
        } else if metrics.late_frame_rate >= LATE_THRESHOLD_DELTA
            && jitter_ms > JITTER_THRESHOLD_DELTA_MS
            && current.delta_depth > bounds.min_delta_depth
        {
            (
                AdaptationSettings {
                    delta_depth: current.delta_depth - 1,
                    ..current
                },
                AdaptationEvent::DeltaDepthReduced,
            )
        } else if jitter_ms > JITTER_TIGHTEN_MS {
            (
                AdaptationSettings {
                    deadline_offset_ms: current.deadline_offset_ms.saturating_sub(DEADLINE_STEP_MS),
                    ..current
                },
                AdaptationEvent::DeadlineAdjusted,
            )
        } else if jitter_ms < JITTER_RELAX_MS {
            (
                AdaptationSettings {
                    deadline_offset_ms: current.deadline_offset_ms.saturating_add(DEADLINE_STEP_MS),
                    ..current
                },
                AdaptationEvent::DeadlineAdjusted,
            )
        } else {
            return (next, None);
        };

        if !bounds.admits(candidate) {
            return self.degrade(next, DegradedReason::ExceededProfileBounds);
        }
        next.settings = candidate;
        next.frames_in_state = 0;
        (next, Some(event))
    }

    fn degrade(&self, mut next: Self, reason: DegradedReason) -> (Self, Option<AdaptationEvent>) {
        next.degraded_safe = true;
        next.last_safe = Some(self.settings);
        next.frames_in_state = 0;
        (next, Some(AdaptationEvent::EnteredDegradedSafe(reason)))
    }
}

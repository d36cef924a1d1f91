//! Recovery detection.
//!
//! [`RecoveryMonitor`] watches [`NetworkConditions`] and enters recovery on a
//! burst gap or sustained loss, leaving it only once loss is back under
//! control.

use super::network::NetworkConditions;

const SUSTAINED_LOSS_THRESHOLD: f64 = 0.25;
const CLEAR_LOSS_THRESHOLD: f64 = 0.05;
const BURST_GAP_THRESHOLD: u64 = 3;
const CLEAR_GAP_THRESHOLD: u64 = 1;

/// Why recovery started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryReason {
    SustainedLoss,
    BurstLoss,
}

impl RecoveryReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SustainedLoss => "sustained_loss",
            Self::BurstLoss => "burst_loss",
        }
    }
}

/// Transition reported by [`RecoveryMonitor::feed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryEvent {
    RecoveryStarted(RecoveryReason),
    RecoveryComplete(RecoveryReason),
}

/// Two-state recovery tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryMonitor {
    active: Option<RecoveryReason>,
}

impl RecoveryMonitor {
    #[must_use]
    pub const fn new() -> Self { Self { active: None } }

    /// Evaluate fresh conditions, returning an event on a state change.
    pub fn feed(&mut self, conditions: &NetworkConditions) -> Option<RecoveryEvent> {
        let loss = conditions.metrics().loss_ratio;
        let gap = conditions.max_loss_gap();
        match self.active {
            None => {
                let reason = if gap >= BURST_GAP_THRESHOLD {
                    RecoveryReason::BurstLoss
                } else if loss >= SUSTAINED_LOSS_THRESHOLD {
                    RecoveryReason::SustainedLoss
                } else {
                    return None;
                };
                self.active = Some(reason);
                Some(RecoveryEvent::RecoveryStarted(reason))
            }
            Some(reason) if loss <= CLEAR_LOSS_THRESHOLD && gap <= CLEAR_GAP_THRESHOLD => {
                self.active = None;
                Some(RecoveryEvent::RecoveryComplete(reason))
            }
            Some(_) => None,
        }
    }

    #[must_use]
    pub const fn is_recovering(&self) -> bool { self.active.is_some() }

    #[must_use]
    pub const fn active_reason(&self) -> Option<RecoveryReason> { self.active }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> NetworkConditions {
        let mut cond = NetworkConditions::new();
        cond.record_frame(10, 0, 1_000);
        cond.record_frame(11, 1_000, 2_000);
        cond.record_frame(12, 2_000, 3_000);
        cond
    }

    #[test]
    fn sustained_loss_starts_and_clears() {
        let mut monitor = RecoveryMonitor::new();
        let mut cond = NetworkConditions::new();
        cond.record_frame(1, 0, 0);
        cond.record_frame(2, 1_000, 0);
        cond.record_frame(4, 2_000, 0);

        assert_eq!(
            monitor.feed(&cond),
            Some(RecoveryEvent::RecoveryStarted(RecoveryReason::SustainedLoss))
        );
        assert_eq!(
            monitor.feed(&healthy()),
            Some(RecoveryEvent::RecoveryComplete(RecoveryReason::SustainedLoss))
        );
        assert!(!monitor.is_recovering());
    }

    #[test]
    fn burst_gap_takes_precedence() {
        let mut monitor = RecoveryMonitor::new();
        let mut cond = NetworkConditions::new();
        cond.record_frame(1, 0, 0);
        cond.record_frame(5, 1_000, 0);
        assert_eq!(
            monitor.feed(&cond),
            Some(RecoveryEvent::RecoveryStarted(RecoveryReason::BurstLoss))
        );
        assert_eq!(monitor.active_reason(), Some(RecoveryReason::BurstLoss));
    }

    #[test]
    fn stays_recovering_until_cleared() {
        let mut monitor = RecoveryMonitor::new();
        let mut cond = NetworkConditions::new();
        cond.record_frame(1, 0, 0);
        cond.record_frame(4, 1_000, 0);
        assert!(monitor.feed(&cond).is_some());
        assert_eq!(monitor.feed(&cond), None);
        assert!(monitor.is_recovering());
    }

    #[test]
    fn healthy_stream_never_recovers() {
        let mut monitor = RecoveryMonitor::new();
        assert_eq!(monitor.feed(&healthy()), None);
    }
}

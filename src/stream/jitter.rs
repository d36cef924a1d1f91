//! Gap handling between consecutive frames.

use crate::profile::CompiledStreamProfile;

/// How a stream fills or smooths channel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterStrategy {
    /// An empty frame repeats the previous channels.
    HoldLast,
    /// An empty frame is sent empty.
    Drop,
    /// Each channel is averaged with its previous value.
    Lerp,
}

impl JitterStrategy {
    /// Latency-leaning profiles hold the last frame; resilient ones smooth.
    #[must_use]
    pub const fn for_profile(profile: &CompiledStreamProfile) -> Self {
        if profile.latency_weight() >= profile.resilience_weight() {
            Self::HoldLast
        } else {
            Self::Lerp
        }
    }

    /// Apply the strategy to `channels` given the previously sent channels.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::JitterStrategy;
    ///
    /// let previous = [100, 200];
    /// assert_eq!(JitterStrategy::HoldLast.apply(&[], Some(&previous)), vec![100, 200]);
    /// assert_eq!(JitterStrategy::Lerp.apply(&[0, 0, 10], Some(&previous)), vec![50, 100, 5]);
    /// ```
    #[must_use]
    pub fn apply(self, channels: &[u16], previous: Option<&[u16]>) -> Vec<u16> {
        match (self, previous) {
            (Self::HoldLast, Some(last)) if channels.is_empty() => last.to_vec(),
            (Self::Lerp, Some(last)) => channels
                .iter()
                .enumerate()
                .map(|(idx, &value)| {
                    let prev = last.get(idx).copied().unwrap_or(0);
                    midpoint(prev, value)
                })
                .collect(),
            _ => channels.to_vec(),
        }
    }
}

fn midpoint(a: u16, b: u16) -> u16 {
    // The mean of two u16 values always fits back into u16.
    u16::try_from((u32::from(a) + u32::from(b)) / 2).unwrap_or(u16::MAX)
}

//! Stream profiles.
//!
//! A [`StreamProfile`] states how a stream should trade latency against
//! resilience. Compiling it validates the weights and yields a
//! [`CompiledStreamProfile`] whose `config_id` fingerprints the configuration
//! and travels with every frame.

use sha2::{Digest, Sha256};

/// Declared purpose of a stream.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamIntent {
    /// Balanced default.
    Auto,
    /// Favour prompt delivery.
    Realtime,
    /// Favour smooth output.
    Install,
}

impl StreamIntent {
    /// Lowercase name used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Realtime => "realtime",
            Self::Install => "install",
        }
    }
}

/// Validation failures from [`StreamProfile::compile`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("latency weight must be between 0 and 100 inclusive")]
    LatencyWeightOutOfRange,
    #[error("resilience weight must be between 0 and 100 inclusive")]
    ResilienceWeightOutOfRange,
    #[error("latency and resilience weights cannot both be zero")]
    ZeroTotalWeight,
}

/// Latency/resilience preference for a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamProfile {
    intent: StreamIntent,
    latency_weight: u8,
    resilience_weight: u8,
}

impl StreamProfile {
    const MAX_WEIGHT: u8 = 100;

    /// Balanced profile, 50/50.
    #[must_use]
    pub const fn auto() -> Self { Self::with_weights(StreamIntent::Auto, 50, 50) }

    /// Low-latency profile, 80/20.
    #[must_use]
    pub const fn realtime() -> Self { Self::with_weights(StreamIntent::Realtime, 80, 20) }

    /// Resilient profile, 25/75.
    #[must_use]
    pub const fn install() -> Self { Self::with_weights(StreamIntent::Install, 25, 75) }

    /// Profile with explicit weights. Validation happens in [`compile`](Self::compile).
    #[must_use]
    pub const fn with_weights(intent: StreamIntent, latency_weight: u8, resilience_weight: u8) -> Self {
        Self {
            intent,
            latency_weight,
            resilience_weight,
        }
    }

    #[must_use]
    pub const fn intent(&self) -> StreamIntent { self.intent }

    /// Validate the weights and fingerprint the profile.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if a weight exceeds 100 or both are zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::{StreamIntent, StreamProfile};
    ///
    /// let compiled = StreamProfile::realtime().compile().expect("valid profile");
    /// assert_eq!(compiled.config_id().len(), 64);
    /// assert!(StreamProfile::with_weights(StreamIntent::Auto, 0, 0).compile().is_err());
    /// ```
    pub fn compile(self) -> Result<CompiledStreamProfile, ProfileError> {
        if self.latency_weight > Self::MAX_WEIGHT {
            return Err(ProfileError::LatencyWeightOutOfRange);
        }
        if self.resilience_weight > Self::MAX_WEIGHT {
            return Err(ProfileError::ResilienceWeightOutOfRange);
        }
        if self.latency_weight == 0 && self.resilience_weight == 0 {
            return Err(ProfileError::ZeroTotalWeight);
        }

        let digest = Sha256::digest([
            self.latency_weight,
            self.resilience_weight,
            self.intent as u8,
        ]);
        let config_id = digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
            hex.push_str(&format!("{byte:02x}"));
            hex
        });

        Ok(CompiledStreamProfile {
            intent: self.intent,
            latency_weight: self.latency_weight,
            resilience_weight: self.resilience_weight,
            config_id,
        })
    }
}

impl Default for StreamProfile {
    fn default() -> Self { Self::auto() }
}

/// Validated profile bound to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledStreamProfile {
    intent: StreamIntent,
    latency_weight: u8,
    resilience_weight: u8,
    config_id: String,
}

impl CompiledStreamProfile {
    /// Lowercase hex SHA-256 of the normalised profile.
    #[must_use]
    pub fn config_id(&self) -> &str { &self.config_id }

    #[must_use]
    pub const fn intent(&self) -> StreamIntent { self.intent }

    #[must_use]
    pub const fn latency_weight(&self) -> u8 { self.latency_weight }

    #[must_use]
    pub const fn resilience_weight(&self) -> u8 { self.resilience_weight }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StreamProfile::auto(), 50, 50)]
    #[case(StreamProfile::realtime(), 80, 20)]
    #[case(StreamProfile::install(), 25, 75)]
    fn builtin_weights(#[case] profile: StreamProfile, #[case] latency: u8, #[case] resilience: u8) {
        let compiled = profile.compile().expect("builtin profiles are valid");
        assert_eq!(compiled.latency_weight(), latency);
        assert_eq!(compiled.resilience_weight(), resilience);
    }

    #[rstest]
    #[case(200, 0, ProfileError::LatencyWeightOutOfRange)]
    #[case(10, 101, ProfileError::ResilienceWeightOutOfRange)]
    #[case(0, 0, ProfileError::ZeroTotalWeight)]
    fn invalid_weights_are_rejected(#[case] latency: u8, #[case] resilience: u8, #[case] expected: ProfileError) {
        let result = StreamProfile::with_weights(StreamIntent::Auto, latency, resilience).compile();
        assert_eq!(result, Err(expected));
    }

    #[test]
    fn default_matches_auto() {
        let default = StreamProfile::default().compile().expect("default");
        let auto = StreamProfile::auto().compile().expect("auto");
        assert_eq!(default.config_id(), auto.config_id());
    }

    #[test]
    fn config_id_is_lowercase_hex_digest() {
        let compiled = StreamProfile::realtime().compile().expect("realtime");
        let expected: String = Sha256::digest([80, 20, StreamIntent::Realtime as u8])
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        assert_eq!(compiled.config_id(), expected);
        assert!(compiled.config_id().bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
    }

    #[test]
    fn intent_changes_config_id() {
        let auto = StreamProfile::with_weights(StreamIntent::Auto, 40, 60).compile();
        let install = StreamProfile::with_weights(StreamIntent::Install, 40, 60).compile();
        assert_ne!(
            auto.expect("auto").config_id(),
            install.expect("install").config_id()
        );
    }

    proptest! {
        #[test]
        fn valid_weights_compile_deterministically(
            latency in 0u8..=100,
            resilience in 0u8..=100,
        ) {
            prop_assume!(latency > 0 || resilience > 0);
            let a = StreamProfile::with_weights(StreamIntent::Realtime, latency, resilience).compile();
            let b = StreamProfile::with_weights(StreamIntent::Realtime, latency, resilience).compile();
            let (a, b) = (a.expect("valid"), b.expect("valid"));
            prop_assert_eq!(a.config_id(), b.config_id());
            prop_assert!(a.config_id().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}

//! Challenge signing for the handshake.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Signs and verifies handshake nonces.
pub trait ChallengeAuthenticator: Send + Sync {
    /// Produce a signature over `nonce`.
    fn sign_challenge(&self, nonce: &[u8]) -> Vec<u8>;

    /// Check that `signature` was produced over `nonce` by a trusted peer.
    fn verify_challenge(&self, nonce: &[u8], signature: &[u8]) -> bool;
}

/// Shared-secret authenticator: the signature is `SHA-256(secret || nonce)`.
///
/// # Examples
///
/// ```
/// use alpine_sdk::{ChallengeAuthenticator, StaticKeyAuthenticator};
///
/// let auth = StaticKeyAuthenticator::new(b"stage-left".to_vec());
/// let signature = auth.sign_challenge(b"nonce");
/// assert!(auth.verify_challenge(b"nonce", &signature));
/// assert!(!auth.verify_challenge(b"other", &signature));
/// ```
#[derive(Clone)]
pub struct StaticKeyAuthenticator {
    secret: Vec<u8>,
}

impl StaticKeyAuthenticator {
    /// Secret used when none is configured.
    pub const DEFAULT_SECRET: &'static [u8] = b"default-alnp-secret";

    /// Create an authenticator from a shared secret.
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self { Self { secret } }

    fn digest(&self, nonce: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(nonce);
        hasher.finalize().into()
    }
}

impl Default for StaticKeyAuthenticator {
    fn default() -> Self { Self::new(Self::DEFAULT_SECRET.to_vec()) }
}

impl fmt::Debug for StaticKeyAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyAuthenticator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl ChallengeAuthenticator for StaticKeyAuthenticator {
    fn sign_challenge(&self, nonce: &[u8]) -> Vec<u8> { self.digest(nonce).to_vec() }

    fn verify_challenge(&self, nonce: &[u8], signature: &[u8]) -> bool {
        let expected = self.digest(nonce);
        bool::from(signature.ct_eq(&expected[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_secrets_do_not_verify() {
        let a = StaticKeyAuthenticator::new(b"a".to_vec());
        let b = StaticKeyAuthenticator::new(b"b".to_vec());
        let signature = a.sign_challenge(b"nonce");
        assert!(!b.verify_challenge(b"nonce", &signature));
    }

    #[test]
    fn truncated_signature_fails() {
        let auth = StaticKeyAuthenticator::default();
        let signature = auth.sign_challenge(b"nonce");
        assert!(!auth.verify_challenge(b"nonce", &signature[..16]));
    }

    #[test]
    fn extended_signature_fails() {
        let auth = StaticKeyAuthenticator::default();
        let mut signature = auth.sign_challenge(b"nonce");
        signature.push(0);
        assert!(!auth.verify_challenge(b"nonce", &signature));
    }

    #[test]
    fn flipped_byte_fails() {
        let auth = StaticKeyAuthenticator::default();
        let mut signature = auth.sign_challenge(b"nonce");
        signature[31] ^= 0x01;
        assert!(!auth.verify_challenge(b"nonce", &signature));
    }

    #[test]
    fn debug_hides_secret() {
        let auth = StaticKeyAuthenticator::new(b"hunter2".to_vec());
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}

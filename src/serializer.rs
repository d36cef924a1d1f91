//! Message serialization traits.
//!
//! This module defines the [`Serializer`] trait enabling transports to plug in
//! custom encoding formats. A [`BincodeSerializer`] implementation using
//! bincode's serde bridge is provided as the default.

use std::error::Error;

use bincode::{
    config,
    serde::{decode_from_slice, encode_to_vec},
};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for serializing and deserializing packets.
///
/// # Object Safety
///
/// This trait is not object-safe because its methods are generic. Use
/// concrete serializer types in API bounds.
pub trait Serializer {
    /// Serialize `value` into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    fn serialize<M: Serialize>(&self, value: &M) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;

    /// Deserialize a value from `bytes`, returning it with the bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be parsed.
    fn deserialize<M: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<(M, usize), Box<dyn Error + Send + Sync>>;
}

/// Serializer using `bincode` with its standard configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn serialize<M: Serialize>(&self, value: &M) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        encode_to_vec(value, config::standard())
            .map_err(|error| Box::new(error) as Box<dyn Error + Send + Sync>)
    }

    fn deserialize<M: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<(M, usize), Box<dyn Error + Send + Sync>> {
        decode_from_slice(bytes, config::standard())
            .map_err(|error| Box::new(error) as Box<dyn Error + Send + Sync>)
    }
}

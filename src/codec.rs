//! Payload codecs.
//!
//! Stores only ever see opaque bytes. A [`Codec`] is the single place where a
//! typed value crosses into, or out of, that byte representation.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::Error;

/// Serializes values to bytes and back.
///
/// Any failure, including a value shape the format cannot represent, is
/// reported as [`Error::Encode`] or [`Error::Decode`].
pub trait Codec: Clone + Send + Sync + 'static {
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized;

    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned;
}

/// JSON via [`serde_json`]. The default codec of the single-blob stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
    }

    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Compact binary encoding via [`bincode`](https://crates.io/crates/bincode).
#[cfg(feature = "bincode")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| Error::Encode(e.to_string()))
    }

    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Cross-language binary encoding via [MessagePack](https://crates.io/crates/rmp-serde).
#[cfg(feature = "messagepack")]
#[derive(Clone, Copy, Debug, Default)]
pub struct MessagePackCodec;

#[cfg(feature = "messagepack")]
impl Codec for MessagePackCodec {
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        rmp_serde::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
    }

    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// The binary codec used by the multi-field session store.
///
/// `bincode` wins when both binary features are enabled.
#[cfg(feature = "bincode")]
pub type BinaryCodec = BincodeCodec;

#[cfg(all(feature = "messagepack", not(feature = "bincode")))]
pub type BinaryCodec = MessagePackCodec;

use std::error::Error;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{AnyArray, AnyCowArray};

/// Compression codec that [`encode`][`Codec::encode`]s and
/// [`decode`][`Codec::decode`]s numeric n-dimensional arrays.
pub trait Codec: 'static + Send + Sync + Clone {
    /// Error type that may be returned during [`encode`][`Codec::encode`]ing
    /// and [`decode`][`Codec::decode`]ing.
    type Error: 'static + Send + Sync + Error;

    /// Encodes the `data` and returns the result.
    ///
    /// # Errors
    ///
    /// Errors if encoding the buffer fails.
    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error>;

    /// Decodes the `encoded` data and returns the result.
    ///
    /// # Errors
    ///
    /// Errors if decoding the buffer fails.
    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error>;

    /// Serializes the configuration parameters for this codec.
    ///
    /// The config *must* include an `id` field with the codec identifier,
    /// for which the [`serialize_codec_config_with_id`] helper function may
    /// be used.
    ///
    /// The config *must* be compatible with JSON encoding.
    ///
    /// # Errors
    ///
    /// Errors if serializing the codec configuration fails.
    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>;
}

/// Statically typed compression codec.
pub trait StaticCodec: Codec {
    /// Codec identifier.
    const CODEC_ID: &'static str;

    /// Instantiate a codec from a serialized `config`uration.
    ///
    /// The `config` must *not* contain an `id` field. If the `config` *may*
    /// contain one, use the [`codec_from_config_with_id`] helper function.
    ///
    /// # Errors
    ///
    /// Errors if constructing the codec fails.
    fn from_config<'de, D: Deserializer<'de>>(config: D) -> Result<Self, D::Error>;
}

/// Utility function to serialize a codec's config together with its
/// [`StaticCodec::CODEC_ID`].
///
/// # Errors
///
/// Errors if serializing the codec configuration fails.
pub fn serialize_codec_config_with_id<C: StaticCodec, T: Serialize, S: Serializer>(
    config: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct CodecConfigWithId<'a, T> {
        id: &'a str,
        #[serde(flatten)]
        config: &'a T,
    }

    CodecConfigWithId {
        id: C::CODEC_ID,
        config,
    }
    .serialize(serializer)
}

/// Utility function to instantiate a codec of type `C`, where the `config`
/// *may* still contain an `id` field.
///
/// If the `id` is present, it must match [`StaticCodec::CODEC_ID`].
///
/// # Errors
///
/// Errors if the `id` does not match or if constructing the codec fails.
pub fn codec_from_config_with_id<'de, C: StaticCodec, D: Deserializer<'de>>(
    config: D,
) -> Result<C, D::Error> {
    let mut config = Value::deserialize(config)?;

    if let Some(config) = config.as_object_mut() {
        if let Some(id) = config.remove("id") {
            if !matches!(id, Value::String(ref id) if id == C::CODEC_ID) {
                return Err(serde::de::Error::custom(format!(
                    "expected codec id {:?} but found {id}",
                    C::CODEC_ID
                )));
            }
        }
    }

    C::from_config(config).map_err(serde::de::Error::custom)
}

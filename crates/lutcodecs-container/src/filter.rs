use lutcodecs::{codec_from_config_with_id, AnyArray, AnyCowArray, Codec, StaticCodec};
use lutcodecs_bitgroom::{BitGroomCodec, BitGroomCodecError};
use lutcodecs_zlib::{ZlibCodec, ZlibCodecError};
use lutcodecs_zstd::{ZstdCodec, ZstdCodecError};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug)]
/// A codec that can be part of a variable's filter pipeline.
///
/// Filters are stored in the container header as their codec configuration
/// together with the codec identifier, e.g. `{"id": "zlib", "level": 4}`.
pub enum Filter {
    /// BitGroom significant digit quantization
    BitGroom(BitGroomCodec),
    /// Zlib compression
    Zlib(ZlibCodec),
    /// Zstandard compression
    Zstd(ZstdCodec),
}

impl Filter {
    #[must_use]
    /// The identifier of the filter's codec
    pub const fn id(&self) -> &'static str {
        match self {
            Self::BitGroom(_) => BitGroomCodec::CODEC_ID,
            Self::Zlib(_) => ZlibCodec::CODEC_ID,
            Self::Zstd(_) => ZstdCodec::CODEC_ID,
        }
    }
}

impl Codec for Filter {
    type Error = FilterError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match self {
            Self::BitGroom(codec) => Ok(codec.encode(data)?),
            Self::Zlib(codec) => Ok(codec.encode(data)?),
            Self::Zstd(codec) => Ok(codec.encode(data)?),
        }
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match self {
            Self::BitGroom(codec) => Ok(codec.decode(encoded)?),
            Self::Zlib(codec) => Ok(codec.decode(encoded)?),
            Self::Zstd(codec) => Ok(codec.decode(encoded)?),
        }
    }

    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::BitGroom(codec) => codec.get_config(serializer),
            Self::Zlib(codec) => codec.get_config(serializer),
            Self::Zstd(codec) => codec.get_config(serializer),
        }
    }
}

impl From<BitGroomCodec> for Filter {
    fn from(codec: BitGroomCodec) -> Self {
        Self::BitGroom(codec)
    }
}

impl From<ZlibCodec> for Filter {
    fn from(codec: ZlibCodec) -> Self {
        Self::Zlib(codec)
    }
}

impl From<ZstdCodec> for Filter {
    fn from(codec: ZstdCodec) -> Self {
        Self::Zstd(codec)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get_config(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let config = Value::deserialize(deserializer)?;

        let Some(id) = config.get("id").and_then(Value::as_str) else {
            return Err(D::Error::missing_field("id"));
        };

        let filter = if id == BitGroomCodec::CODEC_ID {
            codec_from_config_with_id::<BitGroomCodec, _>(config).map(Self::BitGroom)
        } else if id == ZlibCodec::CODEC_ID {
            codec_from_config_with_id::<ZlibCodec, _>(config).map(Self::Zlib)
        } else if id == ZstdCodec::CODEC_ID {
            codec_from_config_with_id::<ZstdCodec, _>(config).map(Self::Zstd)
        } else {
            return Err(D::Error::custom(format!("unknown filter codec id {id:?}")));
        };

        filter.map_err(D::Error::custom)
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when applying a [`Filter`].
pub enum FilterError {
    /// the BitGroom filter failed
    #[error(transparent)]
    BitGroom(#[from] BitGroomCodecError),
    /// the Zlib filter failed
    #[error(transparent)]
    Zlib(#[from] ZlibCodecError),
    /// the Zstandard filter failed
    #[error(transparent)]
    Zstd(#[from] ZstdCodecError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU8;

    use lutcodecs_zlib::ZlibLevel;
    use serde_json::json;

    use super::*;

    #[test]
    fn config_roundtrip() {
        let filters = vec![
            Filter::from(BitGroomCodec {
                significant_digits: NonZeroU8::MIN,
            }),
            Filter::from(ZlibCodec {
                level: ZlibLevel::ZLevel4,
            }),
        ];

        let config = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            config,
            json!([
                { "id": "bitgroom", "significant_digits": 1 },
                { "id": "zlib", "level": 4 },
            ])
        );

        let filters: Vec<Filter> = serde_json::from_value(config).unwrap();
        assert_eq!(
            filters.iter().map(Filter::id).collect::<Vec<_>>(),
            ["bitgroom", "zlib"]
        );
    }

    #[test]
    fn unknown_id() {
        let err = serde_json::from_value::<Filter>(json!({ "id": "szip" })).unwrap_err();
        assert!(err.to_string().contains("unknown filter codec id"), "{err}");
    }

    #[test]
    fn missing_id() {
        let err = serde_json::from_value::<Filter>(json!({ "level": 3 })).unwrap_err();
        assert!(err.to_string().contains("missing field `id`"), "{err}");
    }

    #[test]
    fn debug_shows_codec_config() {
        let filter = Filter::from(ZlibCodec {
            level: ZlibLevel::ZLevel4,
        });
        assert_eq!(
            format!("{filter:?}"),
            "Zlib(ZlibCodec { level: ZLevel4 })"
        );
    }
}

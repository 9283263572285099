//! Zstandard compression of whole table variables, exposed as a
//! [`lutcodecs`] codec.

use std::{borrow::Cow, io, ops::RangeInclusive};

use lutcodecs::{
    serialize_codec_config_with_id, AnyArray, AnyArrayConversionError, AnyArrayDType,
    AnyArrayView, AnyCowArray, Codec, StaticCodec,
};
use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
/// Lossless block compressor for table variables, backed by `libzstd`
pub struct ZstdCodec {
    /// Compression effort, validated against the linked library's range
    pub level: ZstdLevel,
}

impl Codec for ZstdCodec {
    type Error = ZstdCodecError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let bytes = compress(data.view(), self.level)?;
        Ok(AnyArray::U8(Array1::from_vec(bytes).into_dyn()))
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let AnyCowArray::U8(bytes) = encoded else {
            return Err(ZstdCodecError::EncodedDataNotBytes {
                dtype: encoded.dtype(),
            });
        };

        if bytes.ndim() != 1 {
            return Err(ZstdCodecError::EncodedDataNotOneDimensional {
                shape: bytes.shape().to_vec(),
            });
        }

        decompress(&AnyCowArray::U8(bytes).to_le_bytes())
    }

    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_codec_config_with_id::<Self, _, _>(self, serializer)
    }
}

impl StaticCodec for ZstdCodec {
    const CODEC_ID: &'static str = "zstd";

    fn from_config<'de, D: Deserializer<'de>>(config: D) -> Result<Self, D::Error> {
        Self::deserialize(config)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[schemars(transparent)]
/// Compression effort that the linked `libzstd` accepts.
///
/// Negative levels trade ratio for speed, the largest levels are the slowest.
pub struct ZstdLevel {
    level: zstd::zstd_safe::CompressionLevel,
}

impl ZstdLevel {
    /// The level `libzstd` picks when none is requested
    pub const DEFAULT: Self = Self {
        level: zstd::DEFAULT_COMPRESSION_LEVEL,
    };

    #[must_use]
    /// Accepts `level` only if it lies in [`ZstdLevel::range`].
    pub fn new(level: i32) -> Option<Self> {
        Self::range().contains(&level).then_some(Self { level })
    }

    #[must_use]
    /// Levels accepted by the linked `libzstd`
    pub fn range() -> RangeInclusive<i32> {
        zstd::compression_level_range()
    }

    #[must_use]
    /// The numeric level
    pub const fn get(self) -> i32 {
        self.level
    }
}

impl Serialize for ZstdLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.level)
    }
}

impl<'de> Deserialize<'de> for ZstdLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = i32::deserialize(deserializer)?;

        Self::new(level).ok_or_else(|| {
            let range = Self::range();
            serde::de::Error::custom(format!(
                "zstd level {level} is outside of {}..={}",
                range.start(),
                range.end()
            ))
        })
    }
}

#[derive(Debug, Error)]
/// Failures of the [`ZstdCodec`].
pub enum ZstdCodecError {
    /// the dtype and shape header could not be written
    #[error("zstd could not write the array header")]
    HeaderEncodeFailed {
        /// Opaque source error
        source: ZstdHeaderError,
    },
    /// `libzstd` rejected the input while compressing
    #[error("zstd could not compress the array")]
    ZstdEncodeFailed {
        /// Opaque source error
        source: ZstdCodingError,
    },
    /// decoding expects a flat byte array
    #[error("zstd expects a flat byte array to decode, not an array of dtype {dtype}")]
    EncodedDataNotBytes {
        /// dtype of the rejected array
        dtype: AnyArrayDType,
    },
    /// decoding expects a flat byte array
    #[error("zstd expects a flat byte array to decode, not a byte array of shape {shape:?}")]
    EncodedDataNotOneDimensional {
        /// shape of the rejected array
        shape: Vec<usize>,
    },
    /// the dtype and shape header could not be read
    #[error("zstd could not read the array header")]
    HeaderDecodeFailed {
        /// Opaque source error
        source: ZstdHeaderError,
    },
    /// bytes remain after the zstd frame ended
    #[error("zstd found trailing bytes after the end of the frame")]
    DecodeExcessiveEncodedData,
    /// the frame ended before the array was filled
    #[error("zstd frame ended before the array described by the header was filled")]
    DecodeProducedLess,
    /// the frame is malformed or overflows the array
    #[error("zstd could not decompress the encoded bytes")]
    ZstdDecodeFailed {
        /// Opaque source error
        source: ZstdCodingError,
    },
    /// the header describes an array that cannot be built
    #[error("zstd header describes an array that cannot be built")]
    DecodeMismatchedArray {
        /// The source of the error
        #[from]
        source: AnyArrayConversionError,
    },
}

#[derive(Debug, Error)]
#[error(transparent)]
/// Opaque postcard failure while handling the array header
pub struct ZstdHeaderError(postcard::Error);

#[derive(Debug, Error)]
#[error(transparent)]
/// Opaque `libzstd` stream failure
pub struct ZstdCodingError(io::Error);

#[allow(clippy::needless_pass_by_value)]
/// Compresses the little-endian bytes of `array` into a single zstd frame
/// behind a dtype and shape header.
///
/// # Errors
///
/// Errors with
/// - [`ZstdCodecError::HeaderEncodeFailed`] if the header cannot be
///   serialized
/// - [`ZstdCodecError::ZstdEncodeFailed`] if `libzstd` fails to compress
pub fn compress(array: AnyArrayView, level: ZstdLevel) -> Result<Vec<u8>, ZstdCodecError> {
    let header = CompressionHeader {
        dtype: array.dtype(),
        shape: Cow::Borrowed(array.shape()),
    };
    let mut encoded = postcard::to_extend(&header, Vec::new()).map_err(|err| {
        ZstdCodecError::HeaderEncodeFailed {
            source: ZstdHeaderError(err),
        }
    })?;

    let bytes = array.to_le_bytes();
    zstd::stream::copy_encode(&*bytes, &mut encoded, level.get()).map_err(|err| {
        ZstdCodecError::ZstdEncodeFailed {
            source: ZstdCodingError(err),
        }
    })?;

    Ok(encoded)
}

/// Decompresses bytes produced by [`compress`] back into an array.
///
/// # Errors
///
/// Errors with
/// - [`ZstdCodecError::HeaderDecodeFailed`] if the header is unreadable
/// - [`ZstdCodecError::DecodeMismatchedArray`] if the header describes an
///   array that is too large or inconsistent
/// - [`ZstdCodecError::ZstdDecodeFailed`] if the frame is malformed
/// - [`ZstdCodecError::DecodeProducedLess`] if the frame is too short for the
///   header's array
/// - [`ZstdCodecError::DecodeExcessiveEncodedData`] if bytes follow the end of
///   the frame
pub fn decompress(encoded: &[u8]) -> Result<AnyArray, ZstdCodecError> {
    let (header, frame) =
        postcard::take_from_bytes::<CompressionHeader>(encoded).map_err(|err| {
            ZstdCodecError::HeaderDecodeFailed {
                source: ZstdHeaderError(err),
            }
        })?;

    let byte_len = header
        .shape
        .iter()
        .try_fold(header.dtype.size(), |len, &n| len.checked_mul(n))
        .ok_or_else(|| AnyArrayConversionError::ShapeOverflow {
            shape: header.shape.to_vec(),
        })?;

    let mut bytes = vec![0_u8; byte_len];
    decompress_into(frame, &mut bytes)?;

    Ok(AnyArray::from_le_bytes(header.dtype, &header.shape, &bytes)?)
}

fn decompress_into(mut frame: &[u8], mut bytes: &mut [u8]) -> Result<(), ZstdCodecError> {
    // both cursors advance so that leftovers on either side can be detected
    #[allow(clippy::needless_borrows_for_generic_args)]
    zstd::stream::copy_decode(&mut frame, &mut bytes).map_err(|err| {
        ZstdCodecError::ZstdDecodeFailed {
            source: ZstdCodingError(err),
        }
    })?;

    if !frame.is_empty() {
        Err(ZstdCodecError::DecodeExcessiveEncodedData)
    } else if !bytes.is_empty() {
        Err(ZstdCodecError::DecodeProducedLess)
    } else {
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CompressionHeader<'a> {
    dtype: AnyArrayDType,
    #[serde(borrow)]
    shape: Cow<'a, [usize]>,
}

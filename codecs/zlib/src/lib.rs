//! Deflate compression with a zlib wrapper, exposed as a [`lutcodecs`] codec.
//!
//! The encoded bytes start with a small postcard header carrying the dtype
//! and shape of the table, so that decoding can reallocate the exact array.

use std::borrow::Cow;

use lutcodecs::{
    serialize_codec_config_with_id, AnyArray, AnyArrayConversionError, AnyArrayDType,
    AnyArrayView, AnyCowArray, Codec, StaticCodec,
};
use miniz_oxide::{
    deflate::core::{self as deflate, CompressorOxide, TDEFLFlush, TDEFLStatus},
    inflate::{
        core::{self as inflate, inflate_flags, DecompressorOxide},
        DecompressError, TINFLStatus,
    },
};
use ndarray::Array1;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Lossless block compressor for table variables, backed by `miniz_oxide`
pub struct ZlibCodec {
    /// Deflate effort
    pub level: ZlibLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
/// Deflate effort, stored in the container header as a plain number.
///
/// `0` only wraps the table in stored blocks, `9` searches hardest for
/// matches.
#[allow(missing_docs)]
pub enum ZlibLevel {
    ZNoCompression = 0,
    ZBestSpeed = 1,
    ZLevel2 = 2,
    ZLevel3 = 3,
    ZLevel4 = 4,
    ZLevel5 = 5,
    ZLevel6 = 6,
    ZLevel7 = 7,
    ZLevel8 = 8,
    ZBestCompression = 9,
}

impl ZlibLevel {
    #[must_use]
    /// Maps a numeric effort onto a level, or [`None`] above `9`.
    pub const fn new(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::ZNoCompression),
            1 => Some(Self::ZBestSpeed),
            2 => Some(Self::ZLevel2),
            3 => Some(Self::ZLevel3),
            4 => Some(Self::ZLevel4),
            5 => Some(Self::ZLevel5),
            6 => Some(Self::ZLevel6),
            7 => Some(Self::ZLevel7),
            8 => Some(Self::ZLevel8),
            9 => Some(Self::ZBestCompression),
            _ => None,
        }
    }
}

impl Codec for ZlibCodec {
    type Error = ZlibCodecError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let bytes = compress(data.view(), self.level)?;
        Ok(AnyArray::U8(Array1::from_vec(bytes).into_dyn()))
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let AnyCowArray::U8(bytes) = encoded else {
            return Err(ZlibCodecError::EncodedDataNotBytes {
                dtype: encoded.dtype(),
            });
        };

        if bytes.ndim() != 1 {
            return Err(ZlibCodecError::EncodedDataNotOneDimensional {
                shape: bytes.shape().to_vec(),
            });
        }

        decompress(&AnyCowArray::U8(bytes).to_le_bytes())
    }

    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_codec_config_with_id::<Self, _, _>(self, serializer)
    }
}

impl StaticCodec for ZlibCodec {
    const CODEC_ID: &'static str = "zlib";

    fn from_config<'de, D: Deserializer<'de>>(config: D) -> Result<Self, D::Error> {
        Self::deserialize(config)
    }
}

#[derive(Debug, Error)]
/// Failures of the [`ZlibCodec`].
pub enum ZlibCodecError {
    /// the dtype and shape header could not be written
    #[error("zlib could not write the array header")]
    HeaderEncodeFailed {
        /// Opaque source error
        source: ZlibHeaderError,
    },
    /// decoding expects a flat byte array
    #[error("zlib expects a flat byte array to decode, not an array of dtype {dtype}")]
    EncodedDataNotBytes {
        /// dtype of the rejected array
        dtype: AnyArrayDType,
    },
    /// decoding expects a flat byte array
    #[error("zlib expects a flat byte array to decode, not a byte array of shape {shape:?}")]
    EncodedDataNotOneDimensional {
        /// shape of the rejected array
        shape: Vec<usize>,
    },
    /// the dtype and shape header could not be read
    #[error("zlib could not read the array header")]
    HeaderDecodeFailed {
        /// Opaque source error
        source: ZlibHeaderError,
    },
    /// bytes remain after the deflate stream ended
    #[error("zlib found trailing bytes after the end of the deflate stream")]
    DecodeExcessiveEncodedData,
    /// the deflate stream ended before the array was filled
    #[error("zlib stream ended before the array described by the header was filled")]
    DecodeProducedLess,
    /// the deflate stream is malformed
    #[error("zlib could not inflate the encoded bytes")]
    ZlibDecodeFailed {
        /// Opaque source error
        source: ZlibDecodeError,
    },
    /// the header describes an array that cannot be built
    #[error("zlib header describes an array that cannot be built")]
    DecodeMismatchedArray {
        /// The source of the error
        #[from]
        source: AnyArrayConversionError,
    },
}

#[derive(Debug, Error)]
#[error(transparent)]
/// Opaque postcard failure while handling the array header
pub struct ZlibHeaderError(postcard::Error);

#[derive(Debug, Error)]
#[error(transparent)]
/// Opaque inflate failure
pub struct ZlibDecodeError(DecompressError);

#[allow(clippy::needless_pass_by_value)]
/// Deflates the little-endian bytes of `array` behind a dtype and shape
/// header.
///
/// # Errors
///
/// Errors with [`ZlibCodecError::HeaderEncodeFailed`] if the header cannot be
/// serialized.
///
/// # Panics
///
/// Panics if `miniz_oxide` reports a failure while deflating into a growable
/// buffer, which no input can cause.
pub fn compress(array: AnyArrayView, level: ZlibLevel) -> Result<Vec<u8>, ZlibCodecError> {
    let header = CompressionHeader {
        dtype: array.dtype(),
        shape: Cow::Borrowed(array.shape()),
    };
    let encoded = postcard::to_extend(&header, Vec::new()).map_err(|err| {
        ZlibCodecError::HeaderEncodeFailed {
            source: ZlibHeaderError(err),
        }
    })?;

    Ok(deflate_after(encoded, &array.to_le_bytes(), level))
}

/// Appends the zlib stream of `data` to `encoded`.
fn deflate_after(mut encoded: Vec<u8>, data: &[u8], level: ZlibLevel) -> Vec<u8> {
    // positive window bits select the zlib framing around the raw deflate
    let flags = deflate::create_comp_flags_from_zip_params(i32::from(level as u8), 1, 0);
    let mut compressor = CompressorOxide::new(flags);

    let mut consumed = 0;
    let mut written = encoded.len();
    encoded.resize(written + (data.len() / 2).max(2), 0);

    loop {
        let (Some(input), Some(output)) = (data.get(consumed..), encoded.get_mut(written..)) else {
            #[allow(clippy::panic)]
            {
                panic!("zlib deflate cursor left its buffers")
            }
        };

        let (status, read, wrote) =
            deflate::compress(&mut compressor, input, output, TDEFLFlush::Finish);
        consumed += read;
        written += wrote;

        match status {
            TDEFLStatus::Okay if encoded.len().saturating_sub(written) < 30 => {
                encoded.resize(encoded.len() * 2, 0);
            }
            TDEFLStatus::Okay => (),
            TDEFLStatus::Done => {
                assert_eq!(consumed, data.len(), "zlib deflate stopped early");
                encoded.truncate(written);
                return encoded;
            }
            #[allow(clippy::panic)]
            status => panic!("zlib deflate failed with {status:?}"),
        }
    }
}

/// Inflates bytes produced by [`compress`] back into an array.
///
/// # Errors
///
/// Errors with
/// - [`ZlibCodecError::HeaderDecodeFailed`] if the header is unreadable
/// - [`ZlibCodecError::DecodeMismatchedArray`] if the header describes an
///   array that is too large or inconsistent
/// - [`ZlibCodecError::ZlibDecodeFailed`] if the deflate stream is malformed
/// - [`ZlibCodecError::DecodeProducedLess`] if the stream is too short for
///   the header's array
/// - [`ZlibCodecError::DecodeExcessiveEncodedData`] if bytes follow the end
///   of the stream
pub fn decompress(encoded: &[u8]) -> Result<AnyArray, ZlibCodecError> {
    let (header, stream) =
        postcard::take_from_bytes::<CompressionHeader>(encoded).map_err(|err| {
            ZlibCodecError::HeaderDecodeFailed {
                source: ZlibHeaderError(err),
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
    inflate_into(stream, &mut bytes)?;

    Ok(AnyArray::from_le_bytes(header.dtype, &header.shape, &bytes)?)
}

fn inflate_into(stream: &[u8], bytes: &mut [u8]) -> Result<(), ZlibCodecError> {
    let flags = inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
        | inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF;
    let mut decompressor = Box::<DecompressorOxide>::default();

    let (status, read, wrote) = inflate::decompress(&mut decompressor, stream, bytes, 0, flags);

    match status {
        TINFLStatus::Done if read != stream.len() => {
            Err(ZlibCodecError::DecodeExcessiveEncodedData)
        }
        TINFLStatus::Done if wrote != bytes.len() => Err(ZlibCodecError::DecodeProducedLess),
        TINFLStatus::Done => Ok(()),
        status => Err(ZlibCodecError::ZlibDecodeFailed {
            source: ZlibDecodeError(DecompressError {
                status,
                output: Vec::new(),
            }),
        }),
    }
}

#[derive(Serialize, Deserialize)]
struct CompressionHeader<'a> {
    dtype: AnyArrayDType,
    #[serde(borrow)]
    shape: Cow<'a, [usize]>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::{Array, ArrayD};

    use super::*;

    fn smooth_table() -> ArrayD<f64> {
        Array::from_shape_fn((8, 16, 4), |(i, j, k)| {
            #[allow(clippy::cast_precision_loss)]
            let (i, j, k) = (i as f64, j as f64, k as f64);
            (i * 0.5 + j * 0.25).sin() * (k + 1.0)
        })
        .into_dyn()
    }

    #[test]
    fn lossless_roundtrip() {
        let data = AnyArray::F64(smooth_table());

        for level in [ZlibLevel::ZNoCompression, ZlibLevel::ZLevel4, ZlibLevel::ZBestCompression] {
            let codec = ZlibCodec { level };
            let encoded = codec.encode(data.cow()).unwrap();
            assert_eq!(encoded.dtype(), AnyArrayDType::U8);
            assert_eq!(encoded.shape().len(), 1);

            let decoded = codec.decode(encoded.into_cow()).unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn higher_level_not_larger() {
        let data = AnyArray::F64(smooth_table().mapv(|x| (x * 16.0).round() / 16.0))
            .cast(AnyArrayDType::F32)
            .unwrap();

        let sizes = [
            ZlibLevel::ZNoCompression,
            ZlibLevel::ZBestSpeed,
            ZlibLevel::ZBestCompression,
        ]
        .map(|level| compress(data.view(), level).unwrap().len());

        assert!(sizes[0] >= sizes[1], "{sizes:?}");
        assert!(sizes[1] >= sizes[2], "{sizes:?}");
    }

    #[test]
    fn level_from_number() {
        assert_eq!(ZlibLevel::new(0), Some(ZlibLevel::ZNoCompression));
        assert_eq!(ZlibLevel::new(4), Some(ZlibLevel::ZLevel4));
        assert_eq!(ZlibLevel::new(10), None);
    }

    #[test]
    fn empty_roundtrip() {
        let data = AnyArray::F64(ArrayD::zeros(vec![0, 3]));
        let decoded = decompress(&compress(data.view(), ZlibLevel::ZLevel6).unwrap()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn truncated_data() {
        let data = AnyArray::F64(smooth_table());
        let mut encoded = compress(data.view(), ZlibLevel::ZLevel6).unwrap();
        encoded.truncate(encoded.len() / 2);

        assert!(decompress(&encoded).is_err());
    }

    #[test]
    fn float_input_rejected_on_decode() {
        let codec = ZlibCodec {
            level: ZlibLevel::ZLevel4,
        };
        assert!(matches!(
            codec.decode(AnyArray::F64(smooth_table()).into_cow()),
            Err(ZlibCodecError::EncodedDataNotBytes {
                dtype: AnyArrayDType::F64
            })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let data = AnyArray::F64(smooth_table());
        let mut encoded = compress(data.view(), ZlibLevel::ZBestSpeed).unwrap();
        encoded.extend_from_slice(&[1, 2, 3]);

        assert!(matches!(
            decompress(&encoded),
            Err(ZlibCodecError::DecodeExcessiveEncodedData)
        ));
    }
}

//! Codec API for lossy and lossless compression of numeric lookup tables.
//!
//! A [`Codec`] transforms an [`AnyArray`] into another [`AnyArray`], e.g. a
//! floating point array into a quantized floating point array or into a
//! one-dimensional byte array. Codecs are configured through serde and their
//! configuration always round-trips through JSON together with the codec
//! identifier, so that a codec pipeline can be stored next to the data it
//! produced and be reinstantiated when the data is read back.

mod array;
mod codec;

pub use array::{
    AnyArray, AnyArrayBase, AnyArrayConversionError, AnyArrayDType, AnyArrayView, AnyCowArray,
    AnyRawData, ArrayDType,
};
pub use codec::{codec_from_config_with_id, serialize_codec_config_with_id, Codec, StaticCodec};

mod sealed {
    pub trait Sealed {}
}

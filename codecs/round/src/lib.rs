//! Fixed decimal digit rounding codec implementation for the [`lutcodecs`]
//! API.
//!
//! Rounding to a fixed number of decimal digits loses the same absolute
//! precision for every value, independent of its magnitude. Use the
//! `lutcodecs-bitgroom` codec instead to keep a fixed number of significant
//! digits.

use std::ops::{Div, Mul};

use lutcodecs::{
    serialize_codec_config_with_id, AnyArray, AnyArrayDType, AnyCowArray, Codec, StaticCodec,
};
use ndarray::{Array, ArrayBase, Data, Dimension};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
/// Codec that rounds the data to a fixed number of decimal digits on encoding
/// and passes through the input unchanged during decoding.
///
/// Ties are rounded to the nearest even digit, i.e. `0.25` rounded to one
/// decimal digit is `0.2`.
///
/// The codec only supports floating point data.
pub struct RoundCodec {
    /// Number of decimal digits after the decimal point that are kept
    pub decimals: u8,
}

impl Codec for RoundCodec {
    type Error = RoundCodecError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match data {
            AnyCowArray::F32(data) => Ok(AnyArray::F32(round(data, self.decimals))),
            AnyCowArray::F64(data) => Ok(AnyArray::F64(round(data, self.decimals))),
            encoded @ AnyCowArray::U8(_) => Err(RoundCodecError::UnsupportedDtype(encoded.dtype())),
        }
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match encoded {
            AnyCowArray::F32(encoded) => Ok(AnyArray::F32(encoded.into_owned())),
            AnyCowArray::F64(encoded) => Ok(AnyArray::F64(encoded.into_owned())),
            encoded @ AnyCowArray::U8(_) => {
                Err(RoundCodecError::UnsupportedDtype(encoded.dtype()))
            }
        }
    }

    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_codec_config_with_id::<Self, _, _>(self, serializer)
    }
}

impl StaticCodec for RoundCodec {
    const CODEC_ID: &'static str = "round";

    fn from_config<'de, D: Deserializer<'de>>(config: D) -> Result<Self, D::Error> {
        Self::deserialize(config)
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when applying the [`RoundCodec`].
pub enum RoundCodecError {
    /// [`RoundCodec`] does not support the dtype
    #[error("Round does not support the dtype {0}")]
    UnsupportedDtype(AnyArrayDType),
}

#[must_use]
/// Rounds the input `data` to `decimals` decimal digits using
/// `round_ties_even(x * 10^decimals) / 10^decimals`.
///
/// Values for which the scaled value is not finite, e.g. because they are
/// already too large to carry any fractional digits, are passed through.
pub fn round<T: Float, S: Data<Elem = T>, D: Dimension>(
    data: ArrayBase<S, D>,
    decimals: u8,
) -> Array<T, D> {
    let scale = T::decimal_scale(decimals);

    let mut encoded = data.into_owned();
    encoded.mapv_inplace(|x| {
        let scaled = x * scale;

        if scaled.is_finite() {
            scaled.round_ties_even() / scale
        } else {
            x
        }
    });
    encoded
}

/// Floating point types.
pub trait Float: Copy + Mul<Output = Self> + Div<Output = Self> {
    /// Dtype of this type
    const TY: AnyArrayDType;

    /// Returns `10^decimals`
    #[must_use]
    fn decimal_scale(decimals: u8) -> Self;

    /// Returns whether the value is neither infinite nor NaN
    #[must_use]
    fn is_finite(self) -> bool;

    /// Rounds to the nearest integer, with ties rounded to even
    #[must_use]
    fn round_ties_even(self) -> Self;
}

impl Float for f32 {
    const TY: AnyArrayDType = AnyArrayDType::F32;

    fn decimal_scale(decimals: u8) -> Self {
        Self::powi(10.0, i32::from(decimals))
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }

    fn round_ties_even(self) -> Self {
        Self::round_ties_even(self)
    }
}

impl Float for f64 {
    const TY: AnyArrayDType = AnyArrayDType::F64;

    fn decimal_scale(decimals: u8) -> Self {
        Self::powi(10.0, i32::from(decimals))
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }

    fn round_ties_even(self) -> Self {
        Self::round_ties_even(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::{array, Array1, ArrayView1};

    use super::*;

    #[test]
    fn zero_decimals() {
        assert_eq!(
            round(ArrayView1::from(&[0.5_f64, 1.5, 2.5, -0.5, -1.5, 1.49]), 0),
            Array1::from_vec(vec![0.0, 2.0, 2.0, -0.0, -2.0, 1.0])
        );
        assert_eq!(
            round(array![[1.0_f64, 2.0, 3.0], [4.0, 5.0, 6.0]], 0),
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]
        );
    }

    #[test]
    fn fixed_absolute_precision() {
        let data = Array1::from_vec(vec![1.234_567_f64, 1_234.567_891, 0.000_123_4, -98.765_432]);

        for decimals in [1_u8, 3, 5] {
            let bound = 0.5 * 10.0_f64.powi(-i32::from(decimals));
            let rounded = round(data.view(), decimals);

            for (x, r) in data.iter().zip(rounded.iter()) {
                assert!((x - r).abs() <= bound * (1.0 + 1e-9), "{x} -> {r}");
            }
        }

        assert_eq!(
            round(data.view(), 1),
            Array1::from_vec(vec![1.2_f64, 1_234.6, 0.0, -98.8])
        );
    }

    #[test]
    fn non_finite_passthrough() {
        let rounded = round(ArrayView1::from(&[f32::INFINITY, f32::MAX, 1.25_f32]), 1);
        assert_eq!(rounded.get(0), Some(&f32::INFINITY));
        assert_eq!(rounded.get(1), Some(&f32::MAX));
        assert_eq!(rounded.get(2), Some(&1.2));
        assert!(round(ArrayView1::from(&[f64::NAN]), 3)
            .iter()
            .all(|x| x.is_nan()));
    }

    #[test]
    fn bytes_unsupported() {
        let codec = RoundCodec { decimals: 2 };
        let err = codec
            .encode(AnyArray::U8(array![1_u8, 2].into_dyn()).into_cow())
            .unwrap_err();
        assert!(matches!(
            err,
            RoundCodecError::UnsupportedDtype(AnyArrayDType::U8)
        ));
    }
}

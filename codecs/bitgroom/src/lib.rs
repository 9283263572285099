//! BitGroom quantization codec implementation for the [`lutcodecs`] API.

use std::num::NonZeroU8;

use lutcodecs::{
    serialize_codec_config_with_id, AnyArray, AnyArrayDType, AnyCowArray, Codec, StaticCodec,
};
use ndarray::{Array, ArrayBase, Data, Dimension};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
/// Codec providing BitGroom quantization, which retains a fixed number of
/// significant decimal digits.
///
/// The trailing mantissa bits that are not needed to represent the
/// significant digits are alternately shaved (set to zero) and set (set to
/// one), so that the quantization error has no mean bias. The exponent is
/// left untouched, i.e. the absolute error scales with the magnitude of each
/// value while the relative error is bounded by [`relative_error_bound`].
///
/// The approach is based on the paper by Zender 2016
/// (<https://doi.org/10.5194/gmd-9-3199-2016>) and follows the BitGroom
/// quantize mode of netCDF-C.
///
/// The codec only supports floating point data.
pub struct BitGroomCodec {
    /// The number of significant decimal digits to retain.
    ///
    /// At most 7 digits are supported for single precision and 15 digits for
    /// double precision data.
    pub significant_digits: NonZeroU8,
}

impl Codec for BitGroomCodec {
    type Error = BitGroomCodecError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match data {
            AnyCowArray::F32(data) => Ok(AnyArray::F32(bit_groom(data, self.significant_digits)?)),
            AnyCowArray::F64(data) => Ok(AnyArray::F64(bit_groom(data, self.significant_digits)?)),
            encoded @ AnyCowArray::U8(_) => {
                Err(BitGroomCodecError::UnsupportedDtype(encoded.dtype()))
            }
        }
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        match encoded {
            AnyCowArray::F32(encoded) => Ok(AnyArray::F32(encoded.into_owned())),
            AnyCowArray::F64(encoded) => Ok(AnyArray::F64(encoded.into_owned())),
            encoded @ AnyCowArray::U8(_) => {
                Err(BitGroomCodecError::UnsupportedDtype(encoded.dtype()))
            }
        }
    }

    fn get_config<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_codec_config_with_id::<Self, _, _>(self, serializer)
    }
}

impl StaticCodec for BitGroomCodec {
    const CODEC_ID: &'static str = "bitgroom";

    fn from_config<'de, D: Deserializer<'de>>(config: D) -> Result<Self, D::Error> {
        Self::deserialize(config)
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when applying the [`BitGroomCodec`].
pub enum BitGroomCodecError {
    /// [`BitGroomCodec`] does not support the dtype
    #[error("BitGroom does not support the dtype {0}")]
    UnsupportedDtype(AnyArrayDType),
    /// [`BitGroomCodec`] cannot retain `significant_digits` for `dtype`
    #[error("BitGroom cannot retain {significant_digits} significant digits for {dtype}")]
    ExcessiveSignificantDigits {
        /// The number of significant digits to retain
        significant_digits: NonZeroU8,
        /// The `dtype` of the data to encode
        dtype: AnyArrayDType,
    },
}

#[must_use]
/// Returns the number of explicit mantissa bits that BitGroom keeps to retain
/// `significant_digits` decimal digits, including one guard bit.
pub fn keep_bits(significant_digits: NonZeroU8) -> u32 {
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let digit_bits = (f64::from(significant_digits.get()) * std::f64::consts::LOG2_10).ceil() as u32;

    digit_bits + 1
}

#[must_use]
/// Upper bound on the relative error `|x' - x| / |x|` that BitGroom
/// introduces for any normal, finite, non-zero value `x` when retaining
/// `significant_digits` decimal digits.
///
/// The bound only depends on the number of digits, never on the exponent of
/// the value, and is at most `0.5 * 10^-significant_digits`.
pub fn relative_error_bound(significant_digits: NonZeroU8) -> f64 {
    #[expect(clippy::cast_possible_wrap)]
    let keep_bits = keep_bits(significant_digits) as i32;

    2.0_f64.powi(-keep_bits)
}

/// BitGroom quantization, which alternately shaves and sets the mantissa bits
/// that are not needed to retain `significant_digits` decimal digits.
///
/// Elements at even (flattened, row-major) positions are shaved, elements at
/// odd positions are set. Zeros are never set, and non-finite values are
/// passed through unchanged.
///
/// # Errors
///
/// Errors with [`BitGroomCodecError::ExcessiveSignificantDigits`] if
/// `significant_digits` exceeds [`T::MAX_SIGNIFICANT_DIGITS`][`Float::MAX_SIGNIFICANT_DIGITS`].
pub fn bit_groom<T: Float, S: Data<Elem = T>, D: Dimension>(
    data: ArrayBase<S, D>,
    significant_digits: NonZeroU8,
) -> Result<Array<T, D>, BitGroomCodecError> {
    if significant_digits.get() > T::MAX_SIGNIFICANT_DIGITS {
        return Err(BitGroomCodecError::ExcessiveSignificantDigits {
            significant_digits,
            dtype: T::TY,
        });
    }

    let mut encoded = data.into_owned();

    let keep_bits = keep_bits(significant_digits);

    // Early return if all mantissa bits are needed
    if keep_bits >= T::MANTISSA_BITS {
        return Ok(encoded);
    }

    // mask of the trailing mantissa bits that are groomed
    let groom_mask = T::MANTISSA_MASK >> keep_bits;
    let shave_mask = !groom_mask;

    for (i, x) in encoded.iter_mut().enumerate() {
        if !x.is_finite() {
            continue;
        }

        let bits = T::to_binary(*x);

        if i % 2 == 0 {
            *x = T::from_binary(bits & shave_mask);
        } else if !x.is_zero() {
            *x = T::from_binary(bits | groom_mask);
        }
    }

    Ok(encoded)
}

/// Floating point types.
pub trait Float: Sized + Copy {
    /// Number of explicitly stored mantissa bits
    const MANTISSA_BITS: u32;
    /// Binary mask to extract only the mantissa bits
    const MANTISSA_MASK: Self::Binary;
    /// Maximum number of significant decimal digits that can be retained
    const MAX_SIGNIFICANT_DIGITS: u8;

    /// Dtype of this type
    const TY: AnyArrayDType;

    /// Binary representation of this type
    type Binary: Copy
        + std::ops::Not<Output = Self::Binary>
        + std::ops::Shr<u32, Output = Self::Binary>
        + std::ops::BitAnd<Self::Binary, Output = Self::Binary>
        + std::ops::BitOr<Self::Binary, Output = Self::Binary>;

    /// Bit-cast the floating point value to its binary representation
    fn to_binary(self) -> Self::Binary;
    /// Bit-cast the binary representation into a floating point value
    fn from_binary(u: Self::Binary) -> Self;

    /// Returns whether the value is neither infinite nor NaN
    fn is_finite(self) -> bool;
    /// Returns whether the value is positive or negative zero
    fn is_zero(self) -> bool;
}

impl Float for f32 {
    type Binary = u32;

    const MANTISSA_BITS: u32 = Self::MANTISSA_DIGITS - 1;
    const MANTISSA_MASK: Self::Binary = (1 << Self::MANTISSA_BITS) - 1;
    const MAX_SIGNIFICANT_DIGITS: u8 = 7;
    const TY: AnyArrayDType = AnyArrayDType::F32;

    fn to_binary(self) -> Self::Binary {
        self.to_bits()
    }

    fn from_binary(u: Self::Binary) -> Self {
        Self::from_bits(u)
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }

    fn is_zero(self) -> bool {
        self == 0.0
    }
}

impl Float for f64 {
    type Binary = u64;

    const MANTISSA_BITS: u32 = Self::MANTISSA_DIGITS - 1;
    const MANTISSA_MASK: Self::Binary = (1 << Self::MANTISSA_BITS) - 1;
    const MAX_SIGNIFICANT_DIGITS: u8 = 15;
    const TY: AnyArrayDType = AnyArrayDType::F64;

    fn to_binary(self) -> Self::Binary {
        self.to_bits()
    }

    fn from_binary(u: Self::Binary) -> Self {
        Self::from_bits(u)
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }

    fn is_zero(self) -> bool {
        self == 0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::{Array1, ArrayView1};

    use super::*;

    fn digits(n: u8) -> NonZeroU8 {
        NonZeroU8::new(n).unwrap()
    }

    #[test]
    fn keep_bits_per_digit() {
        assert_eq!(keep_bits(digits(1)), 5);
        assert_eq!(keep_bits(digits(3)), 11);
        assert_eq!(keep_bits(digits(5)), 18);
        assert_eq!(keep_bits(digits(15)), 51);

        for n in 1..=15 {
            assert!(relative_error_bound(digits(n)) <= 0.5 * 10.0_f64.powi(-i32::from(n)));
        }
    }

    #[test]
    fn shave_and_set_alternate() {
        let groomed = bit_groom(ArrayView1::from(&[1.0_f32, 1.0, 1.0, 1.0]), digits(1)).unwrap();

        // 5 kept bits, the trailing 18 bits are groomed
        let set = f32::from_bits(1.0_f32.to_bits() | ((1 << 18) - 1));
        assert_eq!(groomed, Array1::from_vec(vec![1.0, set, 1.0, set]));

        let groomed = bit_groom(ArrayView1::from(&[1.999_f64, 1.999]), digits(1)).unwrap();
        assert!(groomed.get(0).copied().unwrap() < 1.999);
        assert!(groomed.get(1).copied().unwrap() > 1.999);
    }

    #[test]
    fn relative_error_independent_of_exponent() {
        let values = [
            3.141_592_653_589_793_f64,
            -2.718_281_828_459_045e-7,
            1.234_567_890_123e12,
            6.022_140_76e23,
            -9.109_383_701_5e-31,
            42.0,
            0.1,
        ];
        // every value appears at an even and at an odd position
        let data = Array1::from_iter(values.iter().chain(values.iter()).copied());

        for n in [1_u8, 3, 5, 9, 15] {
            let bound = relative_error_bound(digits(n));
            let groomed = bit_groom(data.view(), digits(n)).unwrap();

            for (x, g) in data.iter().zip(groomed.iter()) {
                assert!(((g - x) / x).abs() < bound, "{x} -> {g} with {n} digits");
            }
        }

        let data = data.mapv(|x| x as f32);
        for n in [1_u8, 3, 6] {
            let bound = relative_error_bound(digits(n));
            let groomed = bit_groom(data.view(), digits(n)).unwrap();

            for (x, g) in data.iter().zip(groomed.iter()) {
                assert!(
                    f64::from((g - x) / x).abs() < bound,
                    "{x} -> {g} with {n} digits"
                );
            }
        }
    }

    #[test]
    fn special_values() {
        let data = [0.0_f64, 0.0, -0.0, -0.0, f64::INFINITY, f64::NEG_INFINITY, f64::NAN];
        let groomed = bit_groom(ArrayView1::from(&data), digits(2)).unwrap();

        for (x, g) in data.iter().zip(groomed.iter()).take(6) {
            assert_eq!(x.to_bits(), g.to_bits());
        }
        assert!(groomed.get(6).unwrap().is_nan());
    }

    #[test]
    fn all_mantissa_bits_kept() {
        let data = [std::f32::consts::PI, std::f32::consts::E];
        let groomed = bit_groom(ArrayView1::from(&data), digits(7)).unwrap();
        assert_eq!(groomed, Array1::from_vec(data.to_vec()));
    }

    #[test]
    fn excessive_digits() {
        assert!(matches!(
            bit_groom(ArrayView1::from(&[1.0_f32]), digits(8)),
            Err(BitGroomCodecError::ExcessiveSignificantDigits {
                dtype: AnyArrayDType::F32,
                ..
            })
        ));
        assert!(matches!(
            bit_groom(ArrayView1::from(&[1.0_f64]), digits(16)),
            Err(BitGroomCodecError::ExcessiveSignificantDigits {
                dtype: AnyArrayDType::F64,
                ..
            })
        ));
        assert!(bit_groom(ArrayView1::from(&[1.0_f64]), digits(15)).is_ok());
    }
}

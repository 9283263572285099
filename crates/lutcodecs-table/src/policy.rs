use std::{fmt, num::NonZeroU8};

use lutcodecs::AnyArrayDType;
use lutcodecs_bitgroom::{BitGroomCodec, Float};
use lutcodecs_container::Filter;
use lutcodecs_zlib::{ZlibCodec, ZlibLevel};
use lutcodecs_zstd::{ZstdCodec, ZstdLevel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::PolicyError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
/// How a [`LabeledArray`](crate::LabeledArray) is stored in a container.
///
/// The default policy stores the data losslessly at double precision without
/// compression.
///
/// At most one of the two lossy transforms may be selected:
/// - `rounding` keeps a fixed number of decimal digits, i.e. it loses the
///   same absolute precision for every value
/// - `quantization` keeps a fixed number of significant digits with
///   BitGroom, i.e. it loses the same relative precision for every value
pub struct EncodingPolicy {
    /// Storage precision of the data and coordinate variables
    #[serde(default)]
    pub numeric_width: NumericWidth,
    /// Block compressor applied to every variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressor: Option<Compressor>,
    /// Compression level, only allowed if a compressor is selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<i32>,
    /// Number of significant decimal digits that BitGroom retains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<NonZeroU8>,
    /// Number of decimal digits that the data is rounded to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding: Option<u8>,
}

impl EncodingPolicy {
    #[must_use]
    /// Lossless storage at the `numeric_width` without compression
    pub const fn lossless(numeric_width: NumericWidth) -> Self {
        Self {
            numeric_width,
            compressor: None,
            compression_level: None,
            quantization: None,
            rounding: None,
        }
    }

    #[must_use]
    /// Compresses every variable with the `compressor`
    pub const fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = Some(compressor);
        self
    }

    #[must_use]
    /// Compresses with the `level` instead of the compressor's default level
    pub const fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    #[must_use]
    /// Retains `significant_digits` significant decimal digits
    pub const fn with_quantization(mut self, significant_digits: NonZeroU8) -> Self {
        self.quantization = Some(significant_digits);
        self
    }

    #[must_use]
    /// Rounds the data to `decimals` decimal digits
    pub const fn with_rounding(mut self, decimals: u8) -> Self {
        self.rounding = Some(decimals);
        self
    }

    #[must_use]
    /// Returns `true` if the policy stores the data without any precision
    /// loss, i.e. at double precision without rounding or quantization
    pub const fn is_lossless(&self) -> bool {
        matches!(self.numeric_width, NumericWidth::F64)
            && self.quantization.is_none()
            && self.rounding.is_none()
    }

    /// Checks that the policy can be applied.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`PolicyError::RoundingAndQuantization`] if both `rounding` and
    ///   `quantization` are set
    /// - [`PolicyError::LevelWithoutCompressor`] if a `compression_level` is
    ///   set without a `compressor`
    /// - [`PolicyError::LevelOutOfRange`] if the `compression_level` is not
    ///   supported by the `compressor`
    /// - [`PolicyError::ExcessiveQuantization`] if `quantization` asks for
    ///   more significant digits than the `numeric_width` can represent
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let (Some(rounding), Some(quantization)) = (self.rounding, self.quantization) {
            return Err(PolicyError::RoundingAndQuantization {
                rounding,
                quantization,
            });
        }

        if let Some(quantization) = self.quantization {
            let max = self.numeric_width.max_significant_digits();

            if quantization.get() > max {
                return Err(PolicyError::ExcessiveQuantization {
                    width: self.numeric_width,
                    quantization,
                    max,
                });
            }
        }

        self.compressor_filter().map(|_| ())
    }

    /// Returns the filter pipeline of the data variable: the BitGroom
    /// quantization, if any, followed by the compressor, if any.
    ///
    /// # Errors
    ///
    /// Errors if the policy is invalid, see [`EncodingPolicy::validate`].
    pub fn data_filters(&self) -> Result<Vec<Filter>, PolicyError> {
        self.validate()?;

        Ok(self
            .quantization
            .map(|significant_digits| Filter::from(BitGroomCodec { significant_digits }))
            .into_iter()
            .chain(self.compressor_filter()?)
            .collect())
    }

    /// Returns the filter pipeline of the coordinate variables, which are
    /// only compressed and never quantized.
    ///
    /// # Errors
    ///
    /// Errors if the policy is invalid, see [`EncodingPolicy::validate`].
    pub fn coordinate_filters(&self) -> Result<Vec<Filter>, PolicyError> {
        self.validate()?;

        Ok(self.compressor_filter()?.into_iter().collect())
    }

    fn compressor_filter(&self) -> Result<Option<Filter>, PolicyError> {
        let Some(compressor) = self.compressor else {
            return match self.compression_level {
                None => Ok(None),
                Some(level) => Err(PolicyError::LevelWithoutCompressor { level }),
            };
        };

        let level = self
            .compression_level
            .unwrap_or_else(|| compressor.default_level());

        let filter = match compressor {
            Compressor::Zlib => u8::try_from(level)
                .ok()
                .and_then(ZlibLevel::new)
                .map(|level| Filter::from(ZlibCodec { level })),
            Compressor::Zstd => {
                ZstdLevel::new(level).map(|level| Filter::from(ZstdCodec { level }))
            }
        };

        filter.map(Some).ok_or_else(|| {
            let (min, max) = compressor.level_range();

            PolicyError::LevelOutOfRange {
                compressor,
                level,
                min,
                max,
            }
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
/// Storage precision of the stored variables
pub enum NumericWidth {
    /// Single precision
    #[serde(rename = "f32", alias = "f4")]
    F32,
    /// Double precision
    #[default]
    #[serde(rename = "f64", alias = "f8")]
    F64,
}

impl NumericWidth {
    #[must_use]
    /// The dtype that variables are stored with
    pub const fn dtype(self) -> AnyArrayDType {
        match self {
            Self::F32 => AnyArrayDType::F32,
            Self::F64 => AnyArrayDType::F64,
        }
    }

    #[must_use]
    /// The largest number of significant decimal digits that BitGroom can
    /// retain at this width
    pub const fn max_significant_digits(self) -> u8 {
        match self {
            Self::F32 => <f32 as Float>::MAX_SIGNIFICANT_DIGITS,
            Self::F64 => <f64 as Float>::MAX_SIGNIFICANT_DIGITS,
        }
    }
}

impl fmt::Display for NumericWidth {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.dtype(), fmt)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
/// Lossless block compressor
pub enum Compressor {
    /// Zlib (deflate) compression
    Zlib,
    /// Zstandard compression
    Zstd,
}

impl Compressor {
    #[must_use]
    /// The level that is used if no compression level is given
    pub const fn default_level(self) -> i32 {
        match self {
            Self::Zlib => ZlibLevel::ZLevel4 as i32,
            Self::Zstd => ZstdLevel::DEFAULT.get(),
        }
    }

    #[must_use]
    /// The smallest and largest supported compression level
    pub fn level_range(self) -> (i32, i32) {
        match self {
            Self::Zlib => (
                ZlibLevel::ZNoCompression as i32,
                ZlibLevel::ZBestCompression as i32,
            ),
            Self::Zstd => {
                let range = ZstdLevel::range();
                (*range.start(), *range.end())
            }
        }
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match self {
            Self::Zlib => "zlib",
            Self::Zstd => "zstd",
        })
    }
}

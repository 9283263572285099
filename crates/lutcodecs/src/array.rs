use std::fmt;

use ndarray::{
    ArrayBase, ArrayD, CowRepr, Data, IxDyn, OwnedRepr, RawData, RawDataClone, RawDataSubst,
    ShapeError, ViewRepr,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An array that owns its data uniquely.
pub type AnyArray = AnyArrayBase<OwnedRepr<()>>;
/// A read-only array view.
pub type AnyArrayView<'a> = AnyArrayBase<ViewRepr<&'a ()>>;
/// An array with copy-on-write behavior.
pub type AnyCowArray<'a> = AnyArrayBase<CowRepr<'a, ()>>;

/// Numeric n-dimensional arrays with dynamic shapes over the dtypes that
/// lookup table containers store.
///
/// Floating point arrays hold the table data and coordinates, byte arrays
/// hold the output of block compressors.
#[expect(missing_docs)]
pub enum AnyArrayBase<T: AnyRawData> {
    U8(ArrayBase<T::U8, IxDyn>),
    F32(ArrayBase<T::F32, IxDyn>),
    F64(ArrayBase<T::F64, IxDyn>),
}

impl<T: AnyRawData> AnyArrayBase<T> {
    /// Returns the total number of elements in the array.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(a) => a.len(),
            Self::F32(a) => a.len(),
            Self::F64(a) => a.len(),
        }
    }

    /// Returns whether the array has any elements.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::U8(a) => a.is_empty(),
            Self::F32(a) => a.is_empty(),
            Self::F64(a) => a.is_empty(),
        }
    }

    /// Returns the dtype of the array.
    pub const fn dtype(&self) -> AnyArrayDType {
        match self {
            Self::U8(_) => AnyArrayDType::U8,
            Self::F32(_) => AnyArrayDType::F32,
            Self::F64(_) => AnyArrayDType::F64,
        }
    }

    /// Returns the shape of the array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(a) => a.shape(),
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
        }
    }
}

impl<T: AnyRawData> AnyArrayBase<T>
where
    T::U8: Data,
    T::F32: Data,
    T::F64: Data,
{
    #[must_use]
    /// Returns a read-only view of the array.
    pub fn view(&self) -> AnyArrayView {
        match self {
            Self::U8(a) => AnyArrayView::U8(a.view()),
            Self::F32(a) => AnyArrayView::F32(a.view()),
            Self::F64(a) => AnyArrayView::F64(a.view()),
        }
    }

    #[must_use]
    /// Returns a copy-on-write view of the array.
    pub fn cow(&self) -> AnyCowArray {
        match self {
            Self::U8(a) => AnyCowArray::U8(a.into()),
            Self::F32(a) => AnyCowArray::F32(a.into()),
            Self::F64(a) => AnyCowArray::F64(a.into()),
        }
    }

    #[must_use]
    /// Turns the array into a uniquely owned array, cloning the array elements
    /// if necessary.
    pub fn into_owned(self) -> AnyArray {
        match self {
            Self::U8(a) => AnyArray::U8(a.into_owned()),
            Self::F32(a) => AnyArray::F32(a.into_owned()),
            Self::F64(a) => AnyArray::F64(a.into_owned()),
        }
    }

    #[must_use]
    /// Returns the array's elements as little-endian bytes in logical
    /// (row-major) order, independent of the array's memory layout.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(a) => a.iter().copied().collect(),
            Self::F32(a) => a.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::F64(a) => a.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Converts the array elements to the `dtype`.
    ///
    /// Floating point arrays can be converted between single and double
    /// precision, where narrowing rounds to the nearest representable value.
    ///
    /// # Errors
    ///
    /// Errors with [`AnyArrayConversionError::Cast`] if a byte array is cast
    /// to a floating point dtype or vice versa.
    pub fn cast(&self, dtype: AnyArrayDType) -> Result<AnyArray, AnyArrayConversionError> {
        match (self, dtype) {
            (Self::U8(a), AnyArrayDType::U8) => Ok(AnyArray::U8(a.to_owned())),
            (Self::F32(a), AnyArrayDType::F32) => Ok(AnyArray::F32(a.to_owned())),
            (Self::F32(a), AnyArrayDType::F64) => Ok(AnyArray::F64(a.mapv(f64::from))),
            #[expect(clippy::cast_possible_truncation)]
            (Self::F64(a), AnyArrayDType::F32) => Ok(AnyArray::F32(a.mapv(|x| x as f32))),
            (Self::F64(a), AnyArrayDType::F64) => Ok(AnyArray::F64(a.to_owned())),
            (src, dst) => Err(AnyArrayConversionError::Cast {
                src: src.dtype(),
                dst,
            }),
        }
    }
}

impl AnyArray {
    /// Reconstructs an array of `dtype` and `shape` from its little-endian
    /// `bytes` in logical (row-major) order.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`AnyArrayConversionError::ShapeOverflow`] if the number of bytes
    ///   described by the `shape` does not fit into memory
    /// - [`AnyArrayConversionError::ByteLength`] if the number of `bytes` does
    ///   not match the `dtype` and `shape`
    pub fn from_le_bytes(
        dtype: AnyArrayDType,
        shape: &[usize],
        bytes: &[u8],
    ) -> Result<Self, AnyArrayConversionError> {
        let expected = shape
            .iter()
            .try_fold(dtype.size(), |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| AnyArrayConversionError::ShapeOverflow {
                shape: shape.to_vec(),
            })?;

        if bytes.len() != expected {
            return Err(AnyArrayConversionError::ByteLength {
                expected,
                found: bytes.len(),
            });
        }

        let shape = IxDyn(shape);

        let array = match dtype {
            AnyArrayDType::U8 => Self::U8(ArrayD::from_shape_vec(shape, bytes.to_vec())?),
            AnyArrayDType::F32 => Self::F32(ArrayD::from_shape_vec(
                shape,
                bytes
                    .chunks_exact(4)
                    .map(|chunk| {
                        let mut le = [0_u8; 4];
                        le.copy_from_slice(chunk);
                        f32::from_le_bytes(le)
                    })
                    .collect(),
            )?),
            AnyArrayDType::F64 => Self::F64(ArrayD::from_shape_vec(
                shape,
                bytes
                    .chunks_exact(8)
                    .map(|chunk| {
                        let mut le = [0_u8; 8];
                        le.copy_from_slice(chunk);
                        f64::from_le_bytes(le)
                    })
                    .collect(),
            )?),
        };

        Ok(array)
    }

    /// Converts the array elements to `T` and unwraps the typed array.
    ///
    /// # Errors
    ///
    /// Errors with [`AnyArrayConversionError::Cast`] if the array cannot be
    /// converted to `T`, see [`AnyArrayBase::cast`].
    pub fn cast_into<T: ArrayDType>(self) -> Result<ArrayD<T>, AnyArrayConversionError> {
        let array = if self.dtype() == T::DTYPE {
            self
        } else {
            self.cast(T::DTYPE)?
        };

        T::try_from_any_array(array).map_err(|array| AnyArrayConversionError::Cast {
            src: array.dtype(),
            dst: T::DTYPE,
        })
    }

    #[must_use]
    /// Returns an owned copy-on-write array.
    pub fn into_cow(self) -> AnyCowArray<'static> {
        match self {
            Self::U8(array) => AnyCowArray::U8(array.into()),
            Self::F32(array) => AnyCowArray::F32(array.into()),
            Self::F64(array) => AnyCowArray::F64(array.into()),
        }
    }
}

impl<T: AnyRawData> Clone for AnyArrayBase<T>
where
    T::U8: RawDataClone,
    T::F32: RawDataClone,
    T::F64: RawDataClone,
{
    fn clone(&self) -> Self {
        match self {
            Self::U8(a) => Self::U8(a.clone()),
            Self::F32(a) => Self::F32(a.clone()),
            Self::F64(a) => Self::F64(a.clone()),
        }
    }
}

impl<T: AnyRawData> fmt::Debug for AnyArrayBase<T>
where
    T::U8: Data,
    T::F32: Data,
    T::F64: Data,
{
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::U8(a) => fmt.debug_tuple("U8").field(a).finish(),
            Self::F32(a) => fmt.debug_tuple("F32").field(a).finish(),
            Self::F64(a) => fmt.debug_tuple("F64").field(a).finish(),
        }
    }
}

impl<T: AnyRawData> PartialEq for AnyArrayBase<T>
where
    T::U8: Data,
    T::F32: Data,
    T::F64: Data,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::U8(l), Self::U8(r)) => l == r,
            (Self::F32(l), Self::F32(r)) => l == r,
            (Self::F64(l), Self::F64(r)) => l == r,
            _ => false,
        }
    }
}

/// Array-representation support for all dtypes included in [`AnyArrayBase`].
#[expect(missing_docs)]
pub trait AnyRawData {
    type U8: RawData<Elem = u8>;
    type F32: RawData<Elem = f32>;
    type F64: RawData<Elem = f64>;
}

impl<T: RawDataSubst<u8> + RawDataSubst<f32> + RawDataSubst<f64>> AnyRawData for T {
    type U8 = <T as RawDataSubst<u8>>::Output;
    type F32 = <T as RawDataSubst<f32>>::Output;
    type F64 = <T as RawDataSubst<f64>>::Output;
}

/// Enum of all dtypes included in [`AnyArrayBase`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[schemars(extend("enum" = ["u8", "uint8", "f32", "float32", "f4", "f64", "float64", "f8"]))]
#[expect(missing_docs)]
pub enum AnyArrayDType {
    #[serde(rename = "u8", alias = "uint8")]
    U8,
    #[serde(rename = "f32", alias = "float32", alias = "f4")]
    F32,
    #[serde(rename = "f64", alias = "float64", alias = "f8")]
    F64,
}

impl AnyArrayDType {
    #[must_use]
    /// Returns the dtype of the type `T`
    pub const fn of<T: ArrayDType>() -> Self {
        T::DTYPE
    }

    #[must_use]
    /// Returns the size of the dtype in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => std::mem::size_of::<u8>(),
            Self::F32 => std::mem::size_of::<f32>(),
            Self::F64 => std::mem::size_of::<f64>(),
        }
    }

    #[must_use]
    /// Returns whether the dtype is a floating point type.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for AnyArrayDType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match self {
            Self::U8 => "u8",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// Types which are included in [`AnyArrayDType`]
pub trait ArrayDType: crate::sealed::Sealed + Copy + 'static {
    /// [`AnyArrayDType`] representation of this type
    const DTYPE: AnyArrayDType;

    /// Wraps the typed `array` into an [`AnyArray`].
    fn into_any_array(array: ArrayD<Self>) -> AnyArray;

    /// Unwraps the typed array from an [`AnyArray`] iff its dtype matches,
    /// and returns the unchanged `array` otherwise.
    ///
    /// # Errors
    ///
    /// Errors with the unchanged `array` if its dtype does not match.
    fn try_from_any_array(array: AnyArray) -> Result<ArrayD<Self>, AnyArray>;
}

macro_rules! array_dtype {
    ($($dtype:ident($ty:ty)),*) => {
        $(
            impl crate::sealed::Sealed for $ty {}

            impl ArrayDType for $ty {
                const DTYPE: AnyArrayDType = AnyArrayDType::$dtype;

                fn into_any_array(array: ArrayD<Self>) -> AnyArray {
                    AnyArray::$dtype(array)
                }

                fn try_from_any_array(array: AnyArray) -> Result<ArrayD<Self>, AnyArray> {
                    match array {
                        AnyArray::$dtype(array) => Ok(array),
                        array => Err(array),
                    }
                }
            }
        )*
    };
}

array_dtype! { U8(u8), F32(f32), F64(f64) }

#[derive(Debug, Error)]
/// Errors that may occur when converting an [`AnyArrayBase`] to or from bytes
/// or between dtypes.
pub enum AnyArrayConversionError {
    /// cannot cast an array from `src` to `dst`
    #[error("cannot cast an array of dtype {src} to {dst}")]
    Cast {
        /// Dtype of the array that is cast
        src: AnyArrayDType,
        /// Requested dtype
        dst: AnyArrayDType,
    },
    /// the byte size of an array of shape `shape` overflows
    #[error("the byte size of an array of shape {shape:?} overflows")]
    ShapeOverflow {
        /// Shape of the array
        shape: Vec<usize>,
    },
    /// expected `expected` bytes but found `found`
    #[error("expected {expected} bytes but found {found}")]
    ByteLength {
        /// Number of bytes described by the dtype and shape
        expected: usize,
        /// Number of bytes provided
        found: usize,
    },
    /// the array elements do not match the shape
    #[error("the array elements do not match the shape")]
    Shape {
        /// The source of the error
        #[from]
        source: ShapeError,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn le_bytes_use_logical_order() {
        let data: Array2<f32> = array![[1.0, 2.0], [3.0, 4.0]];
        let transposed = AnyArray::F32(data.t().to_owned().into_dyn());
        let view = AnyArray::F32(data.into_dyn());

        let bytes = view.view().to_le_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes.get(4..8), Some(2.0_f32.to_le_bytes().as_slice()));

        let decoded = AnyArray::from_le_bytes(AnyArrayDType::F32, &[2, 2], &bytes).unwrap();
        assert_eq!(decoded, view);
        assert_ne!(decoded, transposed);
    }

    #[test]
    fn le_bytes_length_checked() {
        let err = AnyArray::from_le_bytes(AnyArrayDType::F64, &[3], &[0; 16]).unwrap_err();
        assert!(matches!(
            err,
            AnyArrayConversionError::ByteLength {
                expected: 24,
                found: 16
            }
        ));
    }

    #[test]
    fn cast_between_floats() {
        let data = AnyArray::F64(array![0.1_f64, 2.5].into_dyn());

        let narrow = data.cast(AnyArrayDType::F32).unwrap();
        assert_eq!(narrow, AnyArray::F32(array![0.1_f32, 2.5].into_dyn()));

        let wide = narrow.cast(AnyArrayDType::F64).unwrap();
        assert_eq!(wide.dtype(), AnyArrayDType::F64);
        assert_ne!(wide, data);

        assert!(matches!(
            data.cast(AnyArrayDType::U8),
            Err(AnyArrayConversionError::Cast { .. })
        ));
    }

    #[test]
    fn cast_into_typed() {
        let array = AnyArray::F32(array![[0.5_f32, 1.5]].into_dyn());
        assert_eq!(
            array.cast_into::<f64>().unwrap(),
            array![[0.5_f64, 1.5]].into_dyn()
        );

        let bytes = AnyArray::U8(array![1_u8].into_dyn());
        assert!(matches!(
            bytes.cast_into::<f32>(),
            Err(AnyArrayConversionError::Cast {
                src: AnyArrayDType::U8,
                dst: AnyArrayDType::F32,
            })
        ));
    }

    #[test]
    fn dtype_aliases() {
        let dtype: AnyArrayDType = serde_json::from_str("\"f8\"").unwrap();
        assert_eq!(dtype, AnyArrayDType::F64);
        let dtype: AnyArrayDType = serde_json::from_str("\"float32\"").unwrap();
        assert_eq!(dtype, AnyArrayDType::F32);
        assert_eq!(serde_json::to_string(&AnyArrayDType::F32).unwrap(), "\"f32\"");
    }
}

use std::{io, num::NonZeroU8, path::PathBuf};

use lutcodecs::AnyArrayConversionError;
use lutcodecs_container::ContainerError;
use ndarray::ShapeError;
use thiserror::Error;

use crate::policy::{Compressor, NumericWidth};

#[derive(Debug, Error)]
/// Errors that may occur when building, encoding or decoding a
/// [`LabeledArray`](crate::LabeledArray).
pub enum TableError {
    /// the axis labels, coordinates and data do not fit together
    #[error("the labeled array has mismatching axes")]
    ShapeMismatch {
        /// The source of the error
        #[from]
        source: AxisError,
    },
    /// the encoding policy is not valid
    #[error("the encoding policy is invalid")]
    InvalidPolicy {
        /// The source of the error
        #[from]
        source: PolicyError,
    },
    /// the container at `path` could not be created, written or opened
    #[error("failed to access the container at {path:?}")]
    IoFailure {
        /// Path of the container
        path: PathBuf,
        /// The source of the error
        source: io::Error,
    },
    /// the data could not be encoded into the container at `path`
    #[error("failed to encode the container at {path:?}")]
    EncodeFailed {
        /// Path of the container
        path: PathBuf,
        /// The source of the error
        source: ContainerError,
    },
    /// the container at `path` lacks a group, variable or attribute
    #[error("the container at {path:?} is missing an entry")]
    MissingVariable {
        /// Path of the container
        path: PathBuf,
        /// The source of the error
        source: ContainerError,
    },
    /// the container at `path` is structurally inconsistent
    #[error("the container at {path:?} is corrupt")]
    CorruptContainer {
        /// Path of the container
        path: PathBuf,
        /// The source of the error
        source: CorruptionError,
    },
}

#[derive(Debug, Error)]
/// Reasons why the axes of a labeled array do not fit together.
pub enum AxisError {
    /// the number of labels and coordinates differs
    #[error("{labels} axis labels were given but {coords} coordinates")]
    LabelCount {
        /// Number of axis labels
        labels: usize,
        /// Number of coordinates
        coords: usize,
    },
    /// there are no axes
    #[error("a labeled array needs at least one axis")]
    NoAxes,
    /// two axes share the same label
    #[error("the axis label {label:?} is used more than once")]
    DuplicateLabel {
        /// The repeated label
        label: String,
    },
    /// only the trailing axis may be categorical
    #[error("axis {axis} ({label:?}) is categorical but only the trailing axis may be")]
    CategoricalLeadingAxis {
        /// Index of the axis
        axis: usize,
        /// Label of the axis
        label: String,
    },
    /// the trailing axis must be categorical
    #[error("the trailing axis {label:?} must be categorical")]
    NumericTrailingAxis {
        /// Label of the trailing axis
        label: String,
    },
    /// the data has a different rank than there are axes
    #[error("the data has {ndim} dimensions but there are {axes} axes")]
    Rank {
        /// Number of data dimensions
        ndim: usize,
        /// Number of axes
        axes: usize,
    },
    /// the length of a coordinate differs from the data extent along its axis
    #[error("axis {label:?} has {coords} coordinates but the data extent is {extent}")]
    Extent {
        /// Label of the axis
        label: String,
        /// Number of coordinate values
        coords: usize,
        /// Extent of the data along the axis
        extent: usize,
    },
    /// the stored index coordinate and the category labels differ in length
    #[error("the index coordinate has {index} entries but there are {categories} category labels")]
    CategoryCount {
        /// Length of the stored index coordinate
        index: usize,
        /// Number of category labels
        categories: usize,
    },
}

#[derive(Debug, Error)]
/// Reasons why an [`EncodingPolicy`](crate::EncodingPolicy) is invalid.
pub enum PolicyError {
    /// rounding and quantization would compound two lossy transforms
    #[error("rounding to {rounding} decimals and quantizing to {quantization} significant digits cannot be combined")]
    RoundingAndQuantization {
        /// Requested decimal digits
        rounding: u8,
        /// Requested significant digits
        quantization: NonZeroU8,
    },
    /// a compression level needs a compressor
    #[error("compression level {level} was given without a compressor")]
    LevelWithoutCompressor {
        /// The orphaned compression level
        level: i32,
    },
    /// the compression level is not supported by the compressor
    #[error("compression level {level} is not in {min}..={max} for {compressor}")]
    LevelOutOfRange {
        /// The compressor
        compressor: Compressor,
        /// The requested level
        level: i32,
        /// Smallest supported level
        min: i32,
        /// Largest supported level
        max: i32,
    },
    /// more significant digits were requested than the width can represent
    #[error("{width} can represent at most {max} significant digits but {quantization} were requested")]
    ExcessiveQuantization {
        /// Storage width of the data
        width: NumericWidth,
        /// Requested significant digits
        quantization: NonZeroU8,
        /// Most significant digits at `width`
        max: u8,
    },
}

#[derive(Debug, Error)]
/// Structural inconsistencies found while decoding a container.
pub enum CorruptionError {
    /// the container could not be parsed or a variable could not be decoded
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// the stored axes do not fit together
    #[error(transparent)]
    Axes(#[from] AxisError),
    /// a stored variable has an unexpected dtype
    #[error(transparent)]
    Conversion(#[from] AnyArrayConversionError),
    /// a coordinate variable is not one-dimensional
    #[error(transparent)]
    Dimensionality(#[from] ShapeError),
    /// the decoded data has a different shape than the encoded data
    #[error("the decoded data has shape {found:?} instead of {expected:?}")]
    ShapeChanged {
        /// Shape of the encoded data
        expected: Vec<usize>,
        /// Shape of the decoded data
        found: Vec<usize>,
    },
}

impl TableError {
    pub(crate) fn from_container(path: PathBuf, err: ContainerError, reading: bool) -> Self {
        match err {
            ContainerError::Io { source } => Self::IoFailure { path, source },
            err @ (ContainerError::MissingGroup { .. }
            | ContainerError::MissingVariable { .. }
            | ContainerError::MissingAttribute { .. })
                if reading =>
            {
                Self::MissingVariable { path, source: err }
            }
            err if reading => Self::CorruptContainer {
                path,
                source: CorruptionError::Container(err),
            },
            err => Self::EncodeFailed { path, source: err },
        }
    }
}

use std::io;

use lutcodecs::{AnyArrayConversionError, AnyArrayDType};
use thiserror::Error;

use crate::FilterError;

#[derive(Debug, Error)]
/// Errors that may occur when writing or reading a container.
pub enum ContainerError {
    /// reading or writing the container failed
    #[error("failed to read or write the container")]
    Io {
        /// The source of the error
        #[from]
        source: io::Error,
    },
    /// the container does not start with the magic bytes
    #[error("not a lutcodecs container, found magic bytes {found:?}")]
    BadMagic {
        /// The leading bytes that were found instead
        found: Vec<u8>,
    },
    /// the container was written with an unsupported format version
    #[error("unsupported container format version {version}")]
    UnsupportedVersion {
        /// The format version found in the container
        version: u8,
    },
    /// the container ends before its header or payload is complete
    #[error("the container is truncated")]
    Truncated,
    /// the container header could not be encoded or decoded
    #[error("the container header is malformed")]
    Header {
        /// The source of the error
        source: serde_json::Error,
    },
    /// the group does not exist
    #[error("the container has no group {group:?}")]
    MissingGroup {
        /// Name of the group
        group: String,
    },
    /// the variable does not exist in the group
    #[error("the group {group:?} has no variable {variable:?}")]
    MissingVariable {
        /// Name of the group
        group: String,
        /// Name of the variable
        variable: String,
    },
    /// the attribute does not exist in the group
    #[error("the group {group:?} has no attribute {attribute:?}")]
    MissingAttribute {
        /// Name of the group
        group: String,
        /// Name of the attribute
        attribute: String,
    },
    /// the attribute exists but has a different kind of value
    #[error("the attribute {attribute:?} of group {group:?} is not a {expected}")]
    AttributeKind {
        /// Name of the group
        group: String,
        /// Name of the attribute
        attribute: String,
        /// The expected kind of value
        expected: &'static str,
    },
    /// a variable refers to a dimension that the group does not declare
    #[error("the group {group:?} has no dimension {dimension:?}")]
    UnknownDimension {
        /// Name of the group
        group: String,
        /// Name of the dimension
        dimension: String,
    },
    /// a group, dimension, attribute or variable name is already taken
    #[error("the name {name:?} is already used in {scope:?}")]
    DuplicateName {
        /// The group, or the container for group names
        scope: String,
        /// The duplicate name
        name: String,
    },
    /// the data of a variable does not match the shape of its dimensions
    #[error("variable {variable:?} has shape {found:?} but its dimensions have shape {expected:?}")]
    ShapeMismatch {
        /// Name of the variable
        variable: String,
        /// Shape described by the variable's dimensions
        expected: Vec<usize>,
        /// Shape of the data
        found: Vec<usize>,
    },
    /// the decoded data of a variable has a different dtype than declared
    #[error("variable {variable:?} was declared as {expected} but decoded to {found}")]
    DTypeMismatch {
        /// Name of the variable
        variable: String,
        /// Declared dtype
        expected: AnyArrayDType,
        /// Dtype of the decoded data
        found: AnyArrayDType,
    },
    /// the stored payload of a variable lies outside the payload section
    #[error("the payload of variable {variable:?} lies outside the container")]
    PayloadOutOfBounds {
        /// Name of the variable
        variable: String,
    },
    /// the data of a variable cannot be converted
    #[error("the data of variable {variable:?} cannot be converted")]
    Array {
        /// Name of the variable
        variable: String,
        /// The source of the error
        source: AnyArrayConversionError,
    },
    /// a filter of the variable's pipeline failed
    #[error("a filter of variable {variable:?} failed")]
    Filter {
        /// Name of the variable
        variable: String,
        /// The source of the error
        source: FilterError,
    },
}

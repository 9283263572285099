use std::{fs, path::Path};

use lutcodecs::{AnyArray, AnyArrayDType, Codec};

use crate::{
    format::{GroupHeader, Header, VariableHeader, MAGIC, PREAMBLE_LEN, VERSION},
    AttributeValue, ContainerError, Filter,
};

/// Reads the groups and variables of a container that has been loaded into
/// memory in full.
pub struct ContainerReader {
    header: Header,
    payload: Vec<u8>,
}

impl ContainerReader {
    /// Reads the container file at `path`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::Io`] if reading the file fails
    /// - any error of [`ContainerReader::from_bytes`]
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        log::debug!("reading container from {}", path.display());

        Self::from_bytes(&fs::read(path)?)
    }

    /// Parses a container from its `bytes`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::BadMagic`] if the `bytes` do not start with the
    ///   container magic bytes
    /// - [`ContainerError::UnsupportedVersion`] if the container has a
    ///   different format version
    /// - [`ContainerError::Truncated`] if the `bytes` end within the header
    /// - [`ContainerError::Header`] if the header is malformed
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        let Some((magic, rest)) = bytes.split_first_chunk::<4>() else {
            return Err(ContainerError::BadMagic {
                found: bytes.to_vec(),
            });
        };

        if *magic != MAGIC {
            return Err(ContainerError::BadMagic {
                found: magic.to_vec(),
            });
        }

        let Some((&version, rest)) = rest.split_first() else {
            return Err(ContainerError::Truncated);
        };

        if version != VERSION {
            return Err(ContainerError::UnsupportedVersion { version });
        }

        let Some((header_len, rest)) = rest.split_first_chunk::<8>() else {
            return Err(ContainerError::Truncated);
        };

        let header_len = usize::try_from(u64::from_le_bytes(*header_len))
            .map_err(|_| ContainerError::Truncated)?;

        let (Some(header), Some(payload)) = (rest.get(..header_len), rest.get(header_len..))
        else {
            return Err(ContainerError::Truncated);
        };

        let header: Header =
            serde_json::from_slice(header).map_err(|source| ContainerError::Header { source })?;

        log::debug!(
            "parsed container header with {} groups and {} payload bytes after {} bytes",
            header.groups.len(),
            payload.len(),
            PREAMBLE_LEN + header_len,
        );

        Ok(Self {
            header,
            payload: payload.to_vec(),
        })
    }

    /// Returns an iterator over the group names in declaration order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.header.groups.keys().map(String::as_str)
    }

    /// Returns the group called `name`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::MissingGroup`] if the container has no
    /// group called `name`.
    pub fn group(&self, name: &str) -> Result<GroupReader<'_>, ContainerError> {
        let Some((name, group)) = self.header.groups.get_key_value(name) else {
            return Err(ContainerError::MissingGroup {
                group: String::from(name),
            });
        };

        Ok(GroupReader {
            name,
            group,
            payload: &self.payload,
        })
    }
}

#[derive(Clone, Copy)]
/// Reads the dimensions, attributes and variables of a group of a
/// [`ContainerReader`].
pub struct GroupReader<'a> {
    name: &'a str,
    group: &'a GroupHeader,
    payload: &'a [u8],
}

impl<'a> GroupReader<'a> {
    #[must_use]
    /// The name of the group
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// Returns an iterator over the dimension names and lengths in
    /// declaration order.
    pub fn dimensions(&self) -> impl Iterator<Item = (&'a str, usize)> + use<'a> {
        self.group
            .dimensions
            .iter()
            .map(|(name, len)| (name.as_str(), *len))
    }

    /// Returns an iterator over the variable names in declaration order.
    pub fn variable_names(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.group.variables.keys().map(String::as_str)
    }

    /// Returns the attribute called `name`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::MissingAttribute`] if the group has no
    /// attribute called `name`.
    pub fn attribute(&self, name: &str) -> Result<&'a AttributeValue, ContainerError> {
        self.group
            .attributes
            .get(name)
            .ok_or_else(|| ContainerError::MissingAttribute {
                group: String::from(self.name),
                attribute: String::from(name),
            })
    }

    /// Returns the string list attribute called `name`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::MissingAttribute`] if the group has no attribute
    ///   called `name`
    /// - [`ContainerError::AttributeKind`] if the attribute is not a string
    ///   list
    pub fn text_list_attribute(&self, name: &str) -> Result<&'a [String], ContainerError> {
        self.attribute(name)?
            .as_text_list()
            .ok_or_else(|| ContainerError::AttributeKind {
                group: String::from(self.name),
                attribute: String::from(name),
                expected: "string list",
            })
    }

    /// Returns the declared dtype and dimension names of the variable called
    /// `name`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::MissingVariable`] if the group has no
    /// variable called `name`.
    pub fn variable_info(
        &self,
        name: &str,
    ) -> Result<(AnyArrayDType, &'a [String]), ContainerError> {
        let variable = self.variable(name)?;

        Ok((variable.dtype, variable.dimensions.as_slice()))
    }

    /// Reads the variable called `name` in full and decodes it through its
    /// filter pipeline in reverse order.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::MissingVariable`] if the group has no variable
    ///   called `name`
    /// - [`ContainerError::UnknownDimension`] if the variable refers to an
    ///   undeclared dimension
    /// - [`ContainerError::PayloadOutOfBounds`] if the stored payload lies
    ///   outside the container
    /// - [`ContainerError::Array`] if the payload does not match its recorded
    ///   dtype and shape
    /// - [`ContainerError::Filter`] if any of the filters fails
    /// - [`ContainerError::DTypeMismatch`] or [`ContainerError::ShapeMismatch`]
    ///   if the decoded data does not match the variable's declaration
    pub fn read_variable(&self, name: &str) -> Result<AnyArray, ContainerError> {
        let variable = self.variable(name)?;

        let shape = variable
            .dimensions
            .iter()
            .map(|dimension| {
                self.group.dimensions.get(dimension).copied().ok_or_else(|| {
                    ContainerError::UnknownDimension {
                        group: String::from(self.name),
                        dimension: dimension.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bytes = usize::try_from(variable.payload.offset)
            .ok()
            .zip(usize::try_from(variable.payload.len).ok())
            .and_then(|(offset, len)| Some(offset..offset.checked_add(len)?))
            .and_then(|range| self.payload.get(range))
            .ok_or_else(|| ContainerError::PayloadOutOfBounds {
                variable: String::from(name),
            })?;

        let mut decoded =
            AnyArray::from_le_bytes(variable.payload.dtype, &variable.payload.shape, bytes)
                .map_err(|source| ContainerError::Array {
                    variable: String::from(name),
                    source,
                })?;

        for filter in variable.filters.iter().rev() {
            log::debug!("reverting filter {:?} of variable {name:?}", filter.id());

            decoded = Filter::decode(filter, decoded.into_cow()).map_err(|source| {
                ContainerError::Filter {
                    variable: String::from(name),
                    source,
                }
            })?;
        }

        if decoded.dtype() != variable.dtype {
            return Err(ContainerError::DTypeMismatch {
                variable: String::from(name),
                expected: variable.dtype,
                found: decoded.dtype(),
            });
        }

        if decoded.shape() != shape.as_slice() {
            return Err(ContainerError::ShapeMismatch {
                variable: String::from(name),
                expected: shape,
                found: decoded.shape().to_vec(),
            });
        }

        Ok(decoded)
    }

    fn variable(&self, name: &str) -> Result<&'a VariableHeader, ContainerError> {
        self.group
            .variables
            .get(name)
            .ok_or_else(|| ContainerError::MissingVariable {
                group: String::from(self.name),
                variable: String::from(name),
            })
    }
}

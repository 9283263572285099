use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use indexmap::map::Entry;
use lutcodecs::{AnyArrayDType, AnyCowArray, Codec};

use crate::{
    format::{GroupHeader, Header, PayloadHeader, VariableHeader, MAGIC, PREAMBLE_LEN, VERSION},
    AttributeValue, ContainerError, Filter,
};

#[derive(Default)]
/// Builds a container in memory and writes it out in one go.
///
/// Every variable is encoded through its filter pipeline as soon as it is
/// put into a group, so that the final write only has to serialize the
/// header and copy the payload bytes. Writing the same groups, dimensions,
/// attributes and variables in the same order always produces the same
/// bytes.
pub struct ContainerWriter {
    header: Header,
    payload: Vec<u8>,
}

impl ContainerWriter {
    #[must_use]
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new group called `name`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::DuplicateName`] if the container already
    /// has a group called `name`.
    pub fn create_group(&mut self, name: &str) -> Result<GroupWriter<'_>, ContainerError> {
        let Entry::Vacant(entry) = self.header.groups.entry(String::from(name)) else {
            return Err(ContainerError::DuplicateName {
                scope: String::from("/"),
                name: String::from(name),
            });
        };

        log::debug!("creating group {name:?}");

        let name = entry.key().clone();
        let group = entry.insert(GroupHeader::default());

        Ok(GroupWriter {
            name,
            group,
            payload: &mut self.payload,
        })
    }

    /// Writes the container to the `writer` and returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::Header`] if serializing the header fails
    /// - [`ContainerError::Io`] if writing to the `writer` fails
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<u64, ContainerError> {
        let header = serde_json::to_vec(&self.header)
            .map_err(|source| ContainerError::Header { source })?;

        writer.write_all(&MAGIC)?;
        writer.write_all(&[VERSION])?;
        writer.write_all(&(header.len() as u64).to_le_bytes())?;
        writer.write_all(&header)?;
        writer.write_all(&self.payload)?;
        writer.flush()?;

        Ok((PREAMBLE_LEN + header.len() + self.payload.len()) as u64)
    }

    /// Creates (or truncates) the file at `path`, writes the container to it,
    /// and returns the file size in bytes.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::Header`] if serializing the header fails
    /// - [`ContainerError::Io`] if creating or writing the file fails
    pub fn write_file(&self, path: &Path) -> Result<u64, ContainerError> {
        log::debug!("writing container to {}", path.display());

        let mut writer = BufWriter::new(File::create(path)?);
        let size = self.write_to(&mut writer)?;
        writer.into_inner().map_err(|err| err.into_error())?.sync_all()?;

        Ok(size)
    }
}

/// Adds dimensions, attributes and variables to a group of a
/// [`ContainerWriter`].
pub struct GroupWriter<'a> {
    name: String,
    group: &'a mut GroupHeader,
    payload: &'a mut Vec<u8>,
}

impl GroupWriter<'_> {
    #[must_use]
    /// The name of the group
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a new dimension called `name` with length `len`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::DuplicateName`] if the group already has
    /// a dimension called `name`.
    pub fn create_dimension(&mut self, name: &str, len: usize) -> Result<(), ContainerError> {
        let Entry::Vacant(entry) = self.group.dimensions.entry(String::from(name)) else {
            return Err(self.duplicate(name));
        };

        entry.insert(len);

        Ok(())
    }

    /// Sets the attribute called `name` to `value`.
    ///
    /// # Errors
    ///
    /// Errors with [`ContainerError::DuplicateName`] if the group already has
    /// an attribute called `name`.
    pub fn put_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), ContainerError> {
        let Entry::Vacant(entry) = self.group.attributes.entry(String::from(name)) else {
            return Err(self.duplicate(name));
        };

        entry.insert(value.into());

        Ok(())
    }

    /// Stores the `data` as a new variable called `name`.
    ///
    /// The `data` is first converted to `dtype` and then encoded through the
    /// `filters` in order. Its shape must match the lengths of the
    /// `dimensions`, which must have been declared before.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ContainerError::DuplicateName`] if the group already has a
    ///   variable called `name`
    /// - [`ContainerError::UnknownDimension`] if any of the `dimensions` has
    ///   not been declared
    /// - [`ContainerError::ShapeMismatch`] if the shape of the `data` does not
    ///   match the `dimensions`
    /// - [`ContainerError::Array`] if the `data` cannot be converted to
    ///   `dtype`
    /// - [`ContainerError::Filter`] if any of the `filters` fails
    pub fn put_variable(
        &mut self,
        name: &str,
        dimensions: &[&str],
        dtype: AnyArrayDType,
        filters: Vec<Filter>,
        data: AnyCowArray,
    ) -> Result<(), ContainerError> {
        if self.group.variables.contains_key(name) {
            return Err(self.duplicate(name));
        }

        let shape = dimensions
            .iter()
            .map(|dimension| {
                self.group.dimensions.get(*dimension).copied().ok_or_else(|| {
                    ContainerError::UnknownDimension {
                        group: self.name.clone(),
                        dimension: String::from(*dimension),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if data.shape() != shape.as_slice() {
            return Err(ContainerError::ShapeMismatch {
                variable: String::from(name),
                expected: shape,
                found: data.shape().to_vec(),
            });
        }

        let mut encoded = if data.dtype() == dtype {
            data.into_owned()
        } else {
            data.cast(dtype).map_err(|source| ContainerError::Array {
                variable: String::from(name),
                source,
            })?
        };

        for filter in &filters {
            log::debug!("applying filter {:?} to variable {name:?}", filter.id());

            encoded = filter
                .encode(encoded.into_cow())
                .map_err(|source| ContainerError::Filter {
                    variable: String::from(name),
                    source,
                })?;
        }

        let bytes = encoded.to_le_bytes();
        let payload = PayloadHeader {
            dtype: encoded.dtype(),
            shape: encoded.shape().to_vec(),
            offset: self.payload.len() as u64,
            len: bytes.len() as u64,
        };
        self.payload.extend_from_slice(&bytes);

        log::debug!(
            "stored variable {name:?} of shape {shape:?} as {} bytes",
            payload.len
        );

        self.group.variables.insert(
            String::from(name),
            VariableHeader {
                dtype,
                dimensions: dimensions.iter().map(|d| String::from(*d)).collect(),
                filters,
                payload,
            },
        );

        Ok(())
    }

    fn duplicate(&self, name: &str) -> ContainerError {
        ContainerError::DuplicateName {
            scope: self.name.clone(),
            name: String::from(name),
        }
    }
}

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use lutcodecs::{AnyArray, AnyArrayDType, AnyCowArray};
use lutcodecs_container::{ContainerError, ContainerWriter, Filter};
use ndarray::{ArrayD, ArrayViewD, CowArray};

use crate::{
    AxisModel, EncodingPolicy, LabeledArray, TableError, DATA_GROUP, FLABELS_ATTRIBUTE,
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A container that has been written by [`encode`]
pub struct EncodedContainer {
    /// Where the container was written to
    pub path: PathBuf,
    /// Size of the container in bytes
    pub byte_size: u64,
}

/// Encodes the `array` into a container at `destination` under the `policy`,
/// storing its data as the variable `name`.
///
/// The container has a single group with one dimension and one coordinate
/// variable per axis, named after the axis labels. The trailing categorical
/// axis is stored as an index coordinate together with the `flabels`
/// attribute that holds the category labels. The data variable is stored at
/// the policy's numeric width and quantized and compressed according to the
/// `policy`. Coordinate variables are always stored at double precision and
/// only compressed, so they decode to exactly the coordinates of the `array`.
///
/// Encoding the same array with the same policy always produces the same
/// bytes.
///
/// # Errors
///
/// Errors with
/// - [`TableError::InvalidPolicy`] if the `policy` is invalid
/// - [`TableError::ShapeMismatch`] if the axes of the `array` are
///   inconsistent
/// - [`TableError::EncodeFailed`] if the `name` clashes with an axis label
///   or a filter fails
/// - [`TableError::IoFailure`] if the `destination` cannot be written
///
/// Invalid policies and shapes are detected before the `destination` is
/// touched.
pub fn encode(
    array: &LabeledArray,
    name: &str,
    policy: &EncodingPolicy,
    destination: &Path,
) -> Result<EncodedContainer, TableError> {
    let data_filters = policy.data_filters()?;
    let coordinate_filters = policy.coordinate_filters()?;

    let axes = array.axis_model()?;
    axes.check_extents(array.data().shape())?;

    let data: Cow<ArrayD<f64>> = match policy.rounding {
        Some(decimals) => {
            log::debug!("rounding {name:?} to {decimals} decimal digits");
            Cow::Owned(lutcodecs_round::round(array.data().view(), decimals))
        }
        None => Cow::Borrowed(array.data()),
    };

    let container = build_container(
        &axes,
        name,
        policy.numeric_width.dtype(),
        data_filters,
        &coordinate_filters,
        data.view(),
    )
    .map_err(|err| TableError::from_container(destination.to_path_buf(), err, false))?;

    let byte_size = container
        .write_file(destination)
        .map_err(|err| TableError::from_container(destination.to_path_buf(), err, false))?;

    log::debug!(
        "encoded {name:?} into {} ({byte_size} bytes)",
        destination.display()
    );

    Ok(EncodedContainer {
        path: destination.to_path_buf(),
        byte_size,
    })
}

fn build_container(
    axes: &AxisModel,
    name: &str,
    dtype: AnyArrayDType,
    data_filters: Vec<Filter>,
    coordinate_filters: &[Filter],
    data: ArrayViewD<f64>,
) -> Result<ContainerWriter, ContainerError> {
    let labels = axes.labels().iter().map(String::as_str).collect::<Vec<_>>();

    let mut container = ContainerWriter::new();
    let mut group = container.create_group(DATA_GROUP)?;

    group.put_attribute(FLABELS_ATTRIBUTE, axes.category_labels().to_vec())?;

    for (label, extent) in labels.iter().zip(axes.extents()) {
        group.create_dimension(label, extent)?;
    }

    log::debug!(
        "storing {name:?} of shape {:?} as {dtype} with filters {:?}",
        data.shape(),
        data_filters.iter().map(Filter::id).collect::<Vec<_>>(),
    );

    group.put_variable(
        name,
        &labels,
        dtype,
        data_filters,
        AnyCowArray::F64(CowArray::from(data)),
    )?;

    for (label, coord) in axes.stored_coords() {
        group.put_variable(
            label,
            &[label],
            AnyArrayDType::F64,
            coordinate_filters.to_vec(),
            AnyArray::F64(coord.into_dyn()).into_cow(),
        )?;
    }

    Ok(container)
}

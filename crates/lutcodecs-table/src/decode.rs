use std::path::Path;

use lutcodecs_container::{ContainerError, ContainerReader, GroupReader};
use ndarray::{ArrayD, Ix1};

use crate::{
    AxisModel, CorruptionError, LabeledArray, TableError, DATA_GROUP, FLABELS_ATTRIBUTE,
};

/// Decodes the data variable `name` and its axes from the container at
/// `source`.
///
/// The axis labels are the group's dimensions in declaration order. The
/// stored index coordinate of the trailing axis is replaced by the category
/// labels from the `flabels` attribute. The data is always returned at
/// double precision.
///
/// # Errors
///
/// Errors with
/// - [`TableError::IoFailure`] if the `source` cannot be read
/// - [`TableError::MissingVariable`] if the data variable, a coordinate
///   variable, the group or the `flabels` attribute is missing
/// - [`TableError::CorruptContainer`] if the container is malformed or its
///   coordinates, category labels and data do not fit together
pub fn decode(name: &str, source: &Path) -> Result<LabeledArray, TableError> {
    let container_err = |err| TableError::from_container(source.to_path_buf(), err, true);
    let corrupt = |err: CorruptionError| TableError::CorruptContainer {
        path: source.to_path_buf(),
        source: err,
    };

    let container = ContainerReader::open(source).map_err(container_err)?;
    let group = container.group(DATA_GROUP).map_err(container_err)?;

    let labels = group
        .dimensions()
        .map(|(label, _)| String::from(label))
        .collect::<Vec<_>>();

    let mut stored_coords = Vec::with_capacity(labels.len());
    for label in &labels {
        let coord = read_variable(group, label).map_err(container_err)?;
        stored_coords.push(
            coord
                .into_dimensionality::<Ix1>()
                .map_err(|err| corrupt(err.into()))?,
        );
    }

    let category_labels = group
        .text_list_attribute(FLABELS_ATTRIBUTE)
        .map_err(container_err)?
        .to_vec();

    let data = read_variable(group, name).map_err(container_err)?;

    let axes = AxisModel::restore(labels, stored_coords, category_labels)
        .map_err(|err| corrupt(err.into()))?;

    log::debug!(
        "decoded {name:?} of shape {:?} from {}",
        data.shape(),
        source.display()
    );

    let labels = axes.labels().to_vec();
    LabeledArray::new(labels, axes.into_coords(), data).map_err(|err| match err {
        TableError::ShapeMismatch { source } => corrupt(source.into()),
        err => err,
    })
}

fn read_variable(group: GroupReader, name: &str) -> Result<ArrayD<f64>, ContainerError> {
    group
        .read_variable(name)?
        .cast_into::<f64>()
        .map_err(|source| ContainerError::Array {
            variable: String::from(name),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            decode("sflux", &dir.path().join("missing.lutc")),
            Err(TableError::IoFailure { .. })
        ));
    }

    #[test]
    fn not_a_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.lutc");
        std::fs::write(&path, b"definitely not a container").unwrap();

        assert!(matches!(
            decode("sflux", &path),
            Err(TableError::CorruptContainer { .. })
        ));
    }
}

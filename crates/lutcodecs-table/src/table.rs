use ndarray::ArrayD;

use crate::{AxisModel, Coordinate, TableError};

#[derive(Clone, Debug, PartialEq)]
/// An n-dimensional lookup table with labeled axes.
///
/// Each axis has a label and a coordinate. The trailing axis is categorical
/// and names the table's features, every other axis has numeric ordinates.
pub struct LabeledArray {
    labels: Vec<String>,
    coords: Vec<Coordinate>,
    data: ArrayD<f64>,
}

impl LabeledArray {
    /// Creates a labeled array from its axis `labels`, the `coords` of each
    /// axis, and the `data`.
    ///
    /// # Errors
    ///
    /// Errors with [`TableError::ShapeMismatch`] if the `labels`, `coords`
    /// and `data` shape do not fit together.
    pub fn new(
        labels: Vec<String>,
        coords: Vec<Coordinate>,
        data: ArrayD<f64>,
    ) -> Result<Self, TableError> {
        AxisModel::new(&labels, &coords)?.check_extents(data.shape())?;

        Ok(Self {
            labels,
            coords,
            data,
        })
    }

    #[must_use]
    /// The axis labels, in axis order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    /// The coordinates of each axis
    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    #[must_use]
    /// The table's values
    pub const fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Returns the storage view of the array's axes.
    ///
    /// # Errors
    ///
    /// Errors with [`TableError::ShapeMismatch`] if the axes are
    /// inconsistent, which cannot happen for arrays built with
    /// [`LabeledArray::new`].
    pub fn axis_model(&self) -> Result<AxisModel, TableError> {
        Ok(AxisModel::new(&self.labels, &self.coords)?)
    }

    #[must_use]
    /// Splits the array into its labels, coordinates and data.
    pub fn into_parts(self) -> (Vec<String>, Vec<Coordinate>, ArrayD<f64>) {
        (self.labels, self.coords, self.data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ndarray::{array, Array};

    use super::*;
    use crate::AxisError;

    #[test]
    fn valid_array() {
        let array = LabeledArray::new(
            vec![String::from("batch"), String::from("feature")],
            vec![
                Coordinate::from(vec![0.0, 1.0]),
                Coordinate::from(vec!["a", "b", "c"]),
            ],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn(),
        )
        .unwrap();

        assert_eq!(array.labels(), ["batch", "feature"]);
        assert_eq!(array.data().shape(), [2, 3]);
        assert_eq!(
            array.axis_model().unwrap().category_labels(),
            ["a", "b", "c"]
        );
    }

    #[test]
    fn label_count_never_truncated() {
        let err = LabeledArray::new(
            vec![String::from("batch")],
            vec![
                Coordinate::from(vec![0.0, 1.0]),
                Coordinate::from(vec!["a", "b", "c"]),
            ],
            Array::zeros((2, 3)).into_dyn(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            TableError::ShapeMismatch {
                source: AxisError::LabelCount { .. }
            }
        ));
    }

    #[test]
    fn extent_mismatch() {
        let err = LabeledArray::new(
            vec![String::from("batch"), String::from("feature")],
            vec![
                Coordinate::from(vec![0.0, 1.0]),
                Coordinate::from(vec!["a", "b"]),
            ],
            Array::zeros((2, 3)).into_dyn(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            TableError::ShapeMismatch {
                source: AxisError::Extent { .. }
            }
        ));
    }
}

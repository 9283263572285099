//! Axis labels and coordinates of a lookup table.
//!
//! Every axis but the last has numeric coordinates. The trailing axis names
//! the features of the table, so its coordinates are strings. Containers can
//! only store numeric coordinate variables, so the [`AxisModel`] replaces the
//! feature names with an index coordinate `0, 1, ..., n - 1` for storage and
//! keeps the names separately, to be stored as the `flabels` attribute.

use std::collections::HashSet;

use ndarray::Array1;

use crate::AxisError;

#[derive(Clone, Debug, PartialEq)]
/// The coordinate values along one axis
pub enum Coordinate {
    /// Numeric ordinates, e.g. wavelengths or heights
    Numeric(Array1<f64>),
    /// Category names, e.g. the names of the table's features
    Categorical(Vec<String>),
}

impl Coordinate {
    #[must_use]
    /// The number of coordinate values
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Categorical(names) => names.len(),
        }
    }

    #[must_use]
    /// Returns `true` if there are no coordinate values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    /// Returns the numeric ordinates, if the coordinate is numeric
    pub const fn as_numeric(&self) -> Option<&Array1<f64>> {
        match self {
            Self::Numeric(values) => Some(values),
            Self::Categorical(_) => None,
        }
    }

    #[must_use]
    /// Returns the category names, if the coordinate is categorical
    pub fn as_categorical(&self) -> Option<&[String]> {
        match self {
            Self::Numeric(_) => None,
            Self::Categorical(names) => Some(names),
        }
    }
}

impl From<Array1<f64>> for Coordinate {
    fn from(values: Array1<f64>) -> Self {
        Self::Numeric(values)
    }
}

impl From<Vec<f64>> for Coordinate {
    fn from(values: Vec<f64>) -> Self {
        Self::Numeric(Array1::from_vec(values))
    }
}

impl From<Vec<String>> for Coordinate {
    fn from(names: Vec<String>) -> Self {
        Self::Categorical(names)
    }
}

impl From<Vec<&str>> for Coordinate {
    fn from(names: Vec<&str>) -> Self {
        Self::Categorical(names.into_iter().map(String::from).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
/// The storage view of a table's axes.
pub struct AxisModel {
    labels: Vec<String>,
    numeric_coords: Vec<Array1<f64>>,
    category_labels: Vec<String>,
}

impl AxisModel {
    /// Splits the `coords` into the numeric coordinates of the leading axes
    /// and the category labels of the trailing axis.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`AxisError::LabelCount`] if there are not as many `labels` as
    ///   `coords`
    /// - [`AxisError::NoAxes`] if there are no axes
    /// - [`AxisError::DuplicateLabel`] if an axis label is repeated
    /// - [`AxisError::CategoricalLeadingAxis`] or
    ///   [`AxisError::NumericTrailingAxis`] if the categorical axis is not the
    ///   trailing one
    pub fn new(labels: &[String], coords: &[Coordinate]) -> Result<Self, AxisError> {
        if labels.len() != coords.len() {
            return Err(AxisError::LabelCount {
                labels: labels.len(),
                coords: coords.len(),
            });
        }

        let (Some((trailing_label, _)), Some((trailing, leading))) =
            (labels.split_last(), coords.split_last())
        else {
            return Err(AxisError::NoAxes);
        };

        let mut seen = HashSet::with_capacity(labels.len());
        if let Some(label) = labels.iter().find(|label| !seen.insert(label.as_str())) {
            return Err(AxisError::DuplicateLabel {
                label: label.clone(),
            });
        }

        let numeric_coords = leading
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(axis, (coord, label))| match coord {
                Coordinate::Numeric(values) => Ok(values.clone()),
                Coordinate::Categorical(_) => Err(AxisError::CategoricalLeadingAxis {
                    axis,
                    label: label.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Coordinate::Categorical(category_labels) = trailing else {
            return Err(AxisError::NumericTrailingAxis {
                label: trailing_label.clone(),
            });
        };

        Ok(Self {
            labels: labels.to_vec(),
            numeric_coords,
            category_labels: category_labels.clone(),
        })
    }

    /// Rebuilds the axes from the coordinates that were stored for every axis
    /// and the category labels of the trailing axis.
    ///
    /// The stored coordinate of the trailing axis is the index coordinate,
    /// which is replaced by the `category_labels`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`AxisError::LabelCount`] if there are not as many `labels` as
    ///   `stored_coords`
    /// - [`AxisError::NoAxes`] if there are no axes
    /// - [`AxisError::DuplicateLabel`] if an axis label is repeated
    /// - [`AxisError::CategoryCount`] if the index coordinate and the
    ///   `category_labels` differ in length
    pub fn restore(
        labels: Vec<String>,
        mut stored_coords: Vec<Array1<f64>>,
        category_labels: Vec<String>,
    ) -> Result<Self, AxisError> {
        if labels.len() != stored_coords.len() {
            return Err(AxisError::LabelCount {
                labels: labels.len(),
                coords: stored_coords.len(),
            });
        }

        let Some(index_coord) = stored_coords.pop() else {
            return Err(AxisError::NoAxes);
        };

        if index_coord.len() != category_labels.len() {
            return Err(AxisError::CategoryCount {
                index: index_coord.len(),
                categories: category_labels.len(),
            });
        }

        let mut seen = HashSet::with_capacity(labels.len());
        if let Some(label) = labels.iter().find(|label| !seen.insert(label.as_str())) {
            return Err(AxisError::DuplicateLabel {
                label: label.clone(),
            });
        }

        Ok(Self {
            labels,
            numeric_coords: stored_coords,
            category_labels,
        })
    }

    #[must_use]
    /// The axis labels, in axis order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    /// The numeric coordinates of all but the trailing axis
    pub fn numeric_coords(&self) -> &[Array1<f64>] {
        &self.numeric_coords
    }

    #[must_use]
    /// The category labels of the trailing axis
    pub fn category_labels(&self) -> &[String] {
        &self.category_labels
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    /// The index coordinate `0, 1, ..., n - 1` that stands in for the
    /// category labels of the trailing axis
    pub fn index_coord(&self) -> Array1<f64> {
        Array1::from_iter((0..self.category_labels.len()).map(|i| i as f64))
    }

    /// Returns the coordinate that is stored for each axis together with its
    /// label, i.e. the numeric coordinates followed by the index coordinate.
    pub fn stored_coords(&self) -> impl Iterator<Item = (&str, Array1<f64>)> {
        self.labels.iter().map(String::as_str).zip(
            self.numeric_coords
                .iter()
                .cloned()
                .chain(std::iter::once(self.index_coord())),
        )
    }

    #[must_use]
    /// The number of coordinate values along each axis
    pub fn extents(&self) -> Vec<usize> {
        self.numeric_coords
            .iter()
            .map(Array1::len)
            .chain(std::iter::once(self.category_labels.len()))
            .collect()
    }

    /// Checks that the data `shape` matches the coordinate lengths.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`AxisError::Rank`] if the `shape` has a different number of
    ///   dimensions than there are axes
    /// - [`AxisError::Extent`] if the length of a coordinate differs from the
    ///   corresponding data extent
    pub fn check_extents(&self, shape: &[usize]) -> Result<(), AxisError> {
        if shape.len() != self.labels.len() {
            return Err(AxisError::Rank {
                ndim: shape.len(),
                axes: self.labels.len(),
            });
        }

        for ((label, coords), &extent) in self.labels.iter().zip(self.extents()).zip(shape) {
            if coords != extent {
                return Err(AxisError::Extent {
                    label: label.clone(),
                    coords,
                    extent,
                });
            }
        }

        Ok(())
    }

    #[must_use]
    /// Converts the model back into the semantic coordinates of each axis.
    pub fn into_coords(self) -> Vec<Coordinate> {
        self.numeric_coords
            .into_iter()
            .map(Coordinate::Numeric)
            .chain(std::iter::once(Coordinate::Categorical(
                self.category_labels,
            )))
            .collect()
    }
}

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
/// A deterministic sub-selection of an array, with one [`AxisSelection`] per
/// axis.
///
/// An empty selection stands for the default selection, which picks index
/// `0` on every leading axis and the full extent of the two trailing axes.
pub struct Selection(pub Vec<AxisSelection>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
/// The selection along one axis.
///
/// Negative indices count from the end of the axis.
pub enum AxisSelection {
    /// A single index, which removes the axis
    Index(isize),
    /// The full extent of the axis
    Full,
    /// The half-open index range `start..end`
    Range {
        /// First selected index
        start: isize,
        /// One past the last selected index
        end: isize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolved {
    Index(usize),
    Range(usize, usize),
}

impl Selection {
    /// Selects the sub-array of the `data`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`SelectionError::Rank`] if a non-empty selection has a different
    ///   number of axes than the `data`
    /// - [`SelectionError::IndexOutOfBounds`] or
    ///   [`SelectionError::RangeOutOfBounds`] if an index lies outside its
    ///   axis
    pub fn apply(&self, data: ArrayViewD<f64>) -> Result<ArrayD<f64>, SelectionError> {
        let resolved = self.resolve(data.shape())?;

        let mut selected = data;
        for (axis, resolved) in resolved.into_iter().enumerate().rev() {
            match resolved {
                Resolved::Index(index) => selected = selected.index_axis_move(Axis(axis), index),
                Resolved::Range(start, end) => {
                    selected.slice_axis_inplace(Axis(axis), Slice::from(start..end));
                }
            }
        }

        Ok(selected.to_owned())
    }

    /// Returns the shape that the selection produces for a `shape`.
    ///
    /// # Errors
    ///
    /// Errors like [`Selection::apply`].
    pub fn selected_shape(&self, shape: &[usize]) -> Result<Vec<usize>, SelectionError> {
        Ok(self
            .resolve(shape)?
            .into_iter()
            .filter_map(|resolved| match resolved {
                Resolved::Index(_) => None,
                Resolved::Range(start, end) => Some(end - start),
            })
            .collect())
    }

    fn resolve(&self, shape: &[usize]) -> Result<Vec<Resolved>, SelectionError> {
        let default;
        let selection = if self.0.is_empty() {
            default = Self::default_for_rank(shape.len());
            &default
        } else {
            &self.0
        };

        if selection.len() != shape.len() {
            return Err(SelectionError::Rank {
                selected: selection.len(),
                rank: shape.len(),
            });
        }

        selection
            .iter()
            .zip(shape)
            .enumerate()
            .map(|(axis, (selection, &len))| match *selection {
                AxisSelection::Index(index) => resolve_index(index, len, false)
                    .map(Resolved::Index)
                    .ok_or(SelectionError::IndexOutOfBounds { axis, index, len }),
                AxisSelection::Full => Ok(Resolved::Range(0, len)),
                AxisSelection::Range { start, end } => {
                    match (
                        resolve_index(start, len, true),
                        resolve_index(end, len, true),
                    ) {
                        (Some(from), Some(to)) if from <= to => Ok(Resolved::Range(from, to)),
                        _ => Err(SelectionError::RangeOutOfBounds {
                            axis,
                            start,
                            end,
                            len,
                        }),
                    }
                }
            })
            .collect()
    }

    fn default_for_rank(rank: usize) -> Vec<AxisSelection> {
        let leading = rank.saturating_sub(2);

        std::iter::repeat_n(AxisSelection::Index(0), leading)
            .chain(std::iter::repeat_n(AxisSelection::Full, rank - leading))
            .collect()
    }
}

/// Resolves a possibly negative `index` into `0..len`, or into `0..=len` if
/// the index is an `exclusive` range bound.
pub(crate) fn resolve_index(index: isize, len: usize, exclusive: bool) -> Option<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())?
    } else {
        index.unsigned_abs()
    };

    if resolved < len || (exclusive && resolved == len) {
        Some(resolved)
    } else {
        None
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when applying a [`Selection`].
pub enum SelectionError {
    /// the selection does not have one entry per axis
    #[error("the selection covers {selected} axes but the array has {rank}")]
    Rank {
        /// Number of selected axes
        selected: usize,
        /// Number of array axes
        rank: usize,
    },
    /// the index lies outside the axis
    #[error("index {index} is out of bounds for axis {axis} of length {len}")]
    IndexOutOfBounds {
        /// The axis
        axis: usize,
        /// The requested index
        index: isize,
        /// Length of the axis
        len: usize,
    },
    /// the range lies outside the axis
    #[error("range {start}..{end} is out of bounds for axis {axis} of length {len}")]
    RangeOutOfBounds {
        /// The axis
        axis: usize,
        /// The requested start index
        start: isize,
        /// The requested end index
        end: isize,
        /// Length of the axis
        len: usize,
    },
}

//! Fidelity and size evaluation of encoding policies.
//!
//! The [`Evaluator`] encodes the same [`LabeledArray`] under every policy,
//! decodes it again and compares a deterministic sub-selection of each
//! reconstruction against the one produced by a baseline policy.

use std::{
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use ndarray::{Array1, ArrayD, ArrayViewD, Axis, Ix1, ShapeError};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{
    decode, encode, selection::resolve_index, CorruptionError, EncodingPolicy, LabeledArray,
    Selection, SelectionError, TableError,
};

/// File extension of the scratch containers written during an evaluation
pub const CONTAINER_EXTENSION: &str = "lutc";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Evaluates the size and reconstruction error of encoding policies.
pub struct Evaluator {
    workdir: PathBuf,
    dataset_name: String,
    selection: Selection,
}

impl Evaluator {
    #[must_use]
    /// Creates an evaluator that writes its scratch containers into the
    /// `workdir` and stores the data under the `dataset_name`.
    ///
    /// The evaluator compares the default [`Selection`].
    pub fn new(workdir: impl Into<PathBuf>, dataset_name: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            dataset_name: dataset_name.into(),
            selection: Selection::default(),
        }
    }

    #[must_use]
    /// Compares the `selection` instead of the default one.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    /// The directory that holds the scratch containers
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[must_use]
    /// The name of the data variable
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    #[must_use]
    /// The compared sub-selection
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    /// Path of the scratch container for the policy `name`
    pub fn container_path(&self, name: &str) -> PathBuf {
        self.workdir.join(format!(
            "{}_{name}.{CONTAINER_EXTENSION}",
            self.dataset_name
        ))
    }

    /// Evaluates every policy in `policies` on the `array`, in order, and
    /// compares them against the policy named `baseline`.
    ///
    /// Each policy is encoded into a scratch container, measured, decoded
    /// and deleted before the next policy is evaluated. A failing policy is
    /// recorded as [`ReportEntry::Failed`] and does not stop the evaluation
    /// of the remaining ones.
    ///
    /// If the baseline policy itself fails, the report still lists the
    /// sizes of all measured policies, but none of them has [`Fidelity`]
    /// figures.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`EvaluateError::UnknownBaseline`] if `baseline` does not name a
    ///   policy
    /// - [`EvaluateError::Selection`] if the selection does not fit the
    ///   `array`
    pub fn evaluate(
        &self,
        array: &LabeledArray,
        policies: &IndexMap<String, EncodingPolicy>,
        baseline: &str,
    ) -> Result<Report, EvaluateError> {
        if !policies.contains_key(baseline) {
            return Err(EvaluateError::UnknownBaseline {
                baseline: String::from(baseline),
            });
        }

        let sample_shape = self.selection.selected_shape(array.data().shape())?;
        log::debug!(
            "evaluating {} policies on samples of shape {sample_shape:?}",
            policies.len()
        );

        let mut outcomes = IndexMap::with_capacity(policies.len());
        for (name, policy) in policies {
            let path = self.container_path(name);

            let outcome = self.measure(array, policy, &path);
            remove_scratch_container(&path);

            let outcome = match outcome {
                Ok((byte_size, decoded)) => {
                    log::info!("policy {name:?} encoded into {byte_size} bytes");
                    Ok((byte_size, self.selection.apply(decoded.view())?))
                }
                Err(err) => {
                    log::warn!("policy {name:?} failed: {err}");
                    Err(err)
                }
            };

            outcomes.insert(name.clone(), outcome);
        }

        let baseline_sample = match outcomes.get(baseline) {
            Some(Ok((_, sample))) => Some(sample.clone()),
            _ => {
                log::warn!("baseline {baseline:?} failed, reporting sizes only");
                None
            }
        };

        let largest_size = outcomes
            .values()
            .filter_map(|outcome| outcome.as_ref().ok().map(|(byte_size, _)| *byte_size))
            .max()
            .unwrap_or(0);

        let entries = outcomes
            .into_iter()
            .map(|(name, outcome)| {
                let entry = match outcome {
                    Ok((byte_size, sample)) => ReportEntry::Measured(Measurement::new(
                        byte_size,
                        largest_size,
                        sample,
                        baseline_sample.as_ref().map(ArrayD::view),
                    )),
                    Err(error) => ReportEntry::Failed { error },
                };
                (name, entry)
            })
            .collect();

        Ok(Report {
            baseline: String::from(baseline),
            entries,
        })
    }

    fn measure(
        &self,
        array: &LabeledArray,
        policy: &EncodingPolicy,
        path: &Path,
    ) -> Result<(u64, ArrayD<f64>), TableError> {
        let encoded = encode(array, &self.dataset_name, policy, path)?;
        let (_, _, decoded) = decode(&self.dataset_name, path)?.into_parts();

        if decoded.shape() != array.data().shape() {
            return Err(TableError::CorruptContainer {
                path: encoded.path,
                source: CorruptionError::ShapeChanged {
                    expected: array.data().shape().to_vec(),
                    found: decoded.shape().to_vec(),
                },
            });
        }

        Ok((encoded.byte_size, decoded))
    }
}

fn remove_scratch_container(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("removed {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (),
        Err(err) => log::warn!("failed to remove {}: {err}", path.display()),
    }
}

#[derive(Debug, Serialize)]
/// The outcome of evaluating a set of encoding policies
pub struct Report {
    /// Name of the baseline policy
    pub baseline: String,
    /// Outcome of every policy, in evaluation order
    pub entries: IndexMap<String, ReportEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
/// The outcome of evaluating one encoding policy
pub enum ReportEntry {
    /// The policy was encoded, decoded and measured
    Measured(Measurement),
    /// The policy failed to encode or decode
    Failed {
        /// The reason for the failure
        #[serde(serialize_with = "serialize_error")]
        error: TableError,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// Size and reconstruction error of one encoding policy
pub struct Measurement {
    /// Size of the container in bytes
    pub byte_size: u64,
    /// Size of the largest measured container divided by this size
    pub size_ratio_to_largest: f64,
    /// The selected sub-array of the reconstruction
    pub sample: ArrayD<f64>,
    /// Deviation from the baseline sample, absent if the baseline failed
    #[serde(flatten)]
    pub fidelity: Option<Fidelity>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// Deviation of a sample from the baseline sample
pub struct Fidelity {
    /// Mean absolute deviation
    pub mean_absolute_error: f64,
    /// Fraction of sample values that deviate at all
    pub imperfect_rate: f64,
    /// Signed deviation, `sample - baseline`
    pub deviation: ArrayD<f64>,
}

impl Measurement {
    #[allow(clippy::cast_precision_loss)]
    fn new(
        byte_size: u64,
        largest_size: u64,
        sample: ArrayD<f64>,
        baseline: Option<ArrayViewD<f64>>,
    ) -> Self {
        let fidelity = baseline.map(|baseline| Fidelity::new(&sample, &baseline));

        Self {
            byte_size,
            size_ratio_to_largest: largest_size as f64 / byte_size as f64,
            sample,
            fidelity,
        }
    }

    #[must_use]
    /// Mean absolute deviation from the baseline sample
    pub fn mean_absolute_error(&self) -> Option<f64> {
        self.fidelity
            .as_ref()
            .map(|fidelity| fidelity.mean_absolute_error)
    }

    #[must_use]
    /// Fraction of sample values that deviate from the baseline sample
    pub fn imperfect_rate(&self) -> Option<f64> {
        self.fidelity.as_ref().map(|fidelity| fidelity.imperfect_rate)
    }

    #[must_use]
    /// Signed deviation from the baseline sample
    pub fn deviation(&self) -> Option<&ArrayD<f64>> {
        self.fidelity.as_ref().map(|fidelity| &fidelity.deviation)
    }
}

impl Fidelity {
    #[allow(clippy::cast_precision_loss)]
    fn new(sample: &ArrayD<f64>, baseline: &ArrayViewD<f64>) -> Self {
        let deviation = sample - baseline;

        let mean_absolute_error = deviation.mapv(f64::abs).mean().unwrap_or(0.0);
        let imperfect_rate = if deviation.is_empty() {
            0.0
        } else {
            deviation.iter().filter(|x| **x != 0.0).count() as f64 / deviation.len() as f64
        };

        Self {
            mean_absolute_error,
            imperfect_rate,
            deviation,
        }
    }
}

impl Report {
    #[must_use]
    /// Whether the baseline policy was measured, i.e. whether the
    /// measurements carry [`Fidelity`] figures
    pub fn has_baseline(&self) -> bool {
        self.measurement(&self.baseline).is_some()
    }

    #[must_use]
    /// The measurement of the policy `name`, if it succeeded
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        match self.entries.get(name)? {
            ReportEntry::Measured(measurement) => Some(measurement),
            ReportEntry::Failed { .. } => None,
        }
    }

    /// Iterates over the names and errors of all failed policies.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &TableError)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            ReportEntry::Measured(_) => None,
            ReportEntry::Failed { error } => Some((name.as_str(), error)),
        })
    }

    /// Iterates over the names and measurements of all measured policies.
    pub fn measured(&self) -> impl Iterator<Item = (&str, &Measurement)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            ReportEntry::Measured(measurement) => Some((name.as_str(), measurement)),
            ReportEntry::Failed { .. } => None,
        })
    }

    /// Stacks the samples of all measured policies along a new leading
    /// policy axis.
    ///
    /// Returns the policy names in stacking order together with the stacked
    /// array.
    ///
    /// # Errors
    ///
    /// Errors with [`ShapeError`] if no policy was measured.
    pub fn stacked_samples(&self) -> Result<(Vec<&str>, ArrayD<f64>), ShapeError> {
        let (names, samples): (Vec<&str>, Vec<ArrayViewD<f64>>) = self
            .measured()
            .map(|(name, measurement)| (name, measurement.sample.view()))
            .unzip();

        Ok((names, ndarray::stack(Axis(0), &samples)?))
    }

    #[must_use]
    /// The deviation of policy `name` from the baseline along the first
    /// selected axis, at index `lane` of the last selected axis.
    ///
    /// A negative `lane` counts from the end, so `-1` is the last feature.
    ///
    /// Returns [`None`] if the policy or the baseline was not measured, if
    /// the sample is not two-dimensional, or if `lane` is out of bounds.
    pub fn error_curve(&self, name: &str, lane: isize) -> Option<Array1<f64>> {
        let deviation = self.measurement(name)?.deviation()?;

        let &[_, lanes] = deviation.shape() else {
            return None;
        };
        let lane = resolve_index(lane, lanes, false)?;

        deviation
            .index_axis(Axis(1), lane)
            .into_dimensionality::<Ix1>()
            .ok()
            .map(|curve| curve.to_owned())
    }
}

fn serialize_error<S: Serializer>(error: &TableError, serializer: S) -> Result<S::Ok, S::Error> {
    let mut message = error.to_string();

    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = std::error::Error::source(err);
    }

    serializer.serialize_str(&message)
}

#[derive(Debug, Error)]
/// Errors that may occur when evaluating encoding policies
pub enum EvaluateError {
    /// the baseline is not one of the evaluated policies
    #[error("the baseline {baseline:?} is not one of the evaluated policies")]
    UnknownBaseline {
        /// Name of the baseline policy
        baseline: String,
    },
    /// the selection does not fit the array
    #[error("the selection does not fit the labeled array")]
    Selection {
        /// The source of the error
        #[from]
        source: SelectionError,
    },
}

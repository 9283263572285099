use std::{num::NonZeroU8, path::PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Compressor, EncodingPolicy, EvaluateError, Evaluator, LabeledArray, NumericWidth, PolicyError,
    Report, Selection,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Everything that an evaluation run needs besides the data and a scratch
/// directory.
///
/// ```
/// # use lutcodecs_table::EvaluationConfig;
/// let config = EvaluationConfig::from_json_str(r#"{
///     "dataset_name": "sflux",
///     "baseline": "f8",
///     "policies": {
///         "f8": {},
///         "q3": { "quantization": 3, "compressor": "zlib" }
///     }
/// }"#)?;
///
/// assert_eq!(config.policies.len(), 2);
/// # Ok::<(), lutcodecs_table::ConfigError>(())
/// ```
pub struct EvaluationConfig {
    /// Name of the data variable
    pub dataset_name: String,
    /// Name of the policy that the others are compared against
    pub baseline: String,
    /// The compared sub-selection
    #[serde(default)]
    pub selection: Selection,
    /// The evaluated policies, in evaluation order
    pub policies: IndexMap<String, EncodingPolicy>,
}

impl EvaluationConfig {
    #[must_use]
    /// The standard policy matrix for the `dataset_name`, compared against
    /// lossless double precision storage:
    ///
    /// | name | policy |
    /// |---|---|
    /// | `f8` | lossless `f64` |
    /// | `f4` | lossless `f32` |
    /// | `zlib` | lossless `f64` with zlib |
    /// | `q1`, `q3`, `q5` | 1, 3 or 5 significant digits with zlib |
    /// | `r1`, `r3`, `r5` | 1, 3 or 5 decimal digits with zlib |
    pub fn standard(dataset_name: impl Into<String>) -> Self {
        let zlib = EncodingPolicy::lossless(NumericWidth::F64).with_compressor(Compressor::Zlib);

        let mut policies = IndexMap::new();
        policies.insert(
            String::from("f8"),
            EncodingPolicy::lossless(NumericWidth::F64),
        );
        policies.insert(
            String::from("f4"),
            EncodingPolicy::lossless(NumericWidth::F32),
        );
        policies.insert(String::from("zlib"), zlib.clone());

        for digits in [1, 3, 5] {
            if let Some(significant_digits) = NonZeroU8::new(digits) {
                policies.insert(
                    format!("q{digits}"),
                    zlib.clone().with_quantization(significant_digits),
                );
            }
        }
        for digits in [1, 3, 5] {
            policies.insert(format!("r{digits}"), zlib.clone().with_rounding(digits));
        }

        Self {
            dataset_name: dataset_name.into(),
            baseline: String::from("f8"),
            selection: Selection::default(),
            policies,
        }
    }

    /// Parses and validates a JSON evaluation config.
    ///
    /// # Errors
    ///
    /// Errors with [`ConfigError::Json`] if the `json` is not a valid config,
    /// or with another [`ConfigError`] if [`EvaluationConfig::validate`]
    /// fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the baseline names a policy and that every policy is
    /// valid.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`ConfigError::UnknownBaseline`] if the baseline is not a policy
    /// - [`ConfigError::InvalidPolicy`] for the first invalid policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.policies.contains_key(&self.baseline) {
            return Err(ConfigError::UnknownBaseline {
                baseline: self.baseline.clone(),
            });
        }

        for (name, policy) in &self.policies {
            policy
                .validate()
                .map_err(|source| ConfigError::InvalidPolicy {
                    name: name.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    #[must_use]
    /// An [`Evaluator`] that writes its scratch containers into `workdir`
    pub fn evaluator(&self, workdir: impl Into<PathBuf>) -> Evaluator {
        Evaluator::new(workdir, self.dataset_name.clone()).with_selection(self.selection.clone())
    }

    /// Evaluates all policies on the `array`, using `workdir` for scratch
    /// containers.
    ///
    /// # Errors
    ///
    /// Errors like [`Evaluator::evaluate`].
    pub fn evaluate(
        &self,
        workdir: impl Into<PathBuf>,
        array: &LabeledArray,
    ) -> Result<Report, EvaluateError> {
        self.evaluator(workdir)
            .evaluate(array, &self.policies, &self.baseline)
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when loading an [`EvaluationConfig`]
pub enum ConfigError {
    /// the config is not valid JSON or has the wrong structure
    #[error("failed to parse the evaluation config")]
    Json {
        /// The source of the error
        #[from]
        source: serde_json::Error,
    },
    /// the baseline is not one of the policies
    #[error("the baseline {baseline:?} is not one of the configured policies")]
    UnknownBaseline {
        /// Name of the baseline policy
        baseline: String,
    },
    /// one of the policies is invalid
    #[error("the policy {name:?} is invalid")]
    InvalidPolicy {
        /// Name of the policy
        name: String,
        /// The source of the error
        source: PolicyError,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::AxisSelection;

    #[test]
    fn standard_matrix() {
        let config = EvaluationConfig::standard("sflux");

        assert_eq!(
            config.policies.keys().collect::<Vec<_>>(),
            ["f8", "f4", "zlib", "q1", "q3", "q5", "r1", "r3", "r5"]
        );
        assert_eq!(config.baseline, "f8");
        assert!(config.policies["f8"].is_lossless());
        assert!(config.policies["zlib"].is_lossless());
        assert_eq!(config.policies["q3"].quantization, NonZeroU8::new(3));
        assert_eq!(config.policies["r5"].rounding, Some(5));
        config.validate().unwrap();
    }

    #[test]
    fn standard_matrix_roundtrips_through_json() {
        let config = EvaluationConfig::standard("sflux");
        let json = serde_json::to_string(&config).unwrap();

        assert_eq!(EvaluationConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn parse_with_selection() {
        let config = EvaluationConfig::from_json_str(
            r#"{
                "dataset_name": "sflux",
                "baseline": "f8",
                "selection": [{ "index": 0 }, "full", { "range": { "start": 0, "end": 2 } }],
                "policies": { "f8": {}, "f4": { "numeric_width": "f4" } }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.selection,
            Selection(vec![
                AxisSelection::Index(0),
                AxisSelection::Full,
                AxisSelection::Range { start: 0, end: 2 },
            ])
        );
        assert_eq!(config.policies["f4"].numeric_width, NumericWidth::F32);
    }

    #[test]
    fn unknown_baseline() {
        assert!(matches!(
            EvaluationConfig::from_json_str(
                r#"{ "dataset_name": "sflux", "baseline": "f16", "policies": { "f8": {} } }"#
            ),
            Err(ConfigError::UnknownBaseline { baseline }) if baseline == "f16"
        ));
    }

    #[test]
    fn invalid_policy() {
        assert!(matches!(
            EvaluationConfig::from_json_str(
                r#"{
                    "dataset_name": "sflux",
                    "baseline": "f8",
                    "policies": { "f8": {}, "qr": { "quantization": 3, "rounding": 2 } }
                }"#
            ),
            Err(ConfigError::InvalidPolicy {
                name,
                source: PolicyError::RoundingAndQuantization { .. },
            }) if name == "qr"
        ));
    }

    #[test]
    fn unknown_fields() {
        assert!(matches!(
            EvaluationConfig::from_json_str(
                r#"{ "dataset_name": "sflux", "baseline": "f8", "policies": {}, "plot": true }"#
            ),
            Err(ConfigError::Json { .. })
        ));
    }
}

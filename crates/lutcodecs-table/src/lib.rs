//! Lossy and lossless storage of labeled lookup tables in [`lutcodecs`]
//! containers, and evaluation of how much size and fidelity each encoding
//! policy trades.
//!
//! A [`LabeledArray`] is an n-dimensional table whose leading axes have
//! numeric coordinates and whose trailing axis names the table's features.
//! [`encode`] stores it in a container according to an [`EncodingPolicy`],
//! [`decode`] reads it back, and the [`Evaluator`] compares a set of
//! policies against a baseline policy.
//!
//! ```
//! # use lutcodecs_table::{decode, encode, Compressor, Coordinate, EncodingPolicy, LabeledArray};
//! # use ndarray::array;
//! let array = LabeledArray::new(
//!     vec![String::from("batch"), String::from("feature")],
//!     vec![
//!         Coordinate::from(vec![0.0, 1.0]),
//!         Coordinate::from(vec!["a", "b", "c"]),
//!     ],
//!     array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn(),
//! )?;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("sflux.lutc");
//!
//! let policy = EncodingPolicy::default().with_compressor(Compressor::Zlib);
//! encode(&array, "sflux", &policy, &path)?;
//!
//! assert_eq!(decode("sflux", &path)?, array);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod axis;
mod config;
mod decode;
mod encode;
mod error;
mod evaluate;
mod policy;
mod selection;
mod table;

pub use axis::{AxisModel, Coordinate};
pub use config::{ConfigError, EvaluationConfig};
pub use decode::decode;
pub use encode::{encode, EncodedContainer};
pub use error::{AxisError, CorruptionError, PolicyError, TableError};
pub use evaluate::{
    EvaluateError, Evaluator, Fidelity, Measurement, Report, ReportEntry, CONTAINER_EXTENSION,
};
pub use policy::{Compressor, EncodingPolicy, NumericWidth};
pub use selection::{AxisSelection, Selection, SelectionError};
pub use table::LabeledArray;

/// Name of the group that holds the data, dimension and coordinate variables
pub const DATA_GROUP: &str = "data";

/// Name of the group attribute that holds the category labels of the
/// trailing axis
pub const FLABELS_ATTRIBUTE: &str = "flabels";

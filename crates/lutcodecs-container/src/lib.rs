//! Self-describing container format for arrays that are encoded with
//! [`lutcodecs`] filter pipelines.
//!
//! A container holds an ordered set of groups. Each group declares named
//! dimensions, carries attributes, and stores variables whose shapes are
//! given by the dimensions they refer to. Every variable records its own
//! filter pipeline, so a container can be read back without knowing how it
//! was written.
//!
//! ```
//! # use lutcodecs::{AnyArray, AnyArrayDType};
//! # use lutcodecs_container::{ContainerReader, ContainerWriter};
//! # use ndarray::array;
//! let mut container = ContainerWriter::new();
//!
//! let mut group = container.create_group("data")?;
//! group.create_dimension("x", 3)?;
//! group.put_attribute("units", "W m-2")?;
//! group.put_variable(
//!     "x",
//!     &["x"],
//!     AnyArrayDType::F32,
//!     Vec::new(),
//!     AnyArray::F64(array![1.0, 2.0, 3.0].into_dyn()).into_cow(),
//! )?;
//!
//! let mut bytes = Vec::new();
//! container.write_to(&mut bytes)?;
//!
//! let container = ContainerReader::from_bytes(&bytes)?;
//! let x = container.group("data")?.read_variable("x")?;
//! assert_eq!(x.dtype(), AnyArrayDType::F32);
//! # Ok::<(), lutcodecs_container::ContainerError>(())
//! ```

// Only used in tests
#[cfg(test)]
use ::{simple_logger as _, tempfile as _};

mod error;
mod filter;
mod format;
mod reader;
mod writer;

pub use error::ContainerError;
pub use filter::{Filter, FilterError};
pub use format::{AttributeValue, MAGIC, VERSION};
pub use reader::{ContainerReader, GroupReader};
pub use writer::{ContainerWriter, GroupWriter};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU8;

    use lutcodecs::{AnyArray, AnyArrayDType};
    use lutcodecs_bitgroom::BitGroomCodec;
    use lutcodecs_zlib::{ZlibCodec, ZlibLevel};
    use ndarray::{array, Array, ArrayD};

    use super::*;

    fn table() -> ArrayD<f64> {
        Array::from_shape_fn((4, 3), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let (i, j) = (i as f64, j as f64);
            (i * 3.0 + j) / 7.0
        })
        .into_dyn()
    }

    fn write(filters: &[Filter]) -> Vec<u8> {
        let mut container = ContainerWriter::new();
        let mut group = container.create_group("data").unwrap();
        group.create_dimension("wvl", 4).unwrap();
        group.create_dimension("feature", 3).unwrap();
        group
            .put_attribute(
                "flabels",
                vec![String::from("a"), String::from("b"), String::from("c")],
            )
            .unwrap();
        group
            .put_variable(
                "table",
                &["wvl", "feature"],
                AnyArrayDType::F64,
                filters.to_vec(),
                AnyArray::F64(table()).into_cow(),
            )
            .unwrap();

        let mut bytes = Vec::new();
        let size = container.write_to(&mut bytes).unwrap();
        assert_eq!(size, bytes.len() as u64);
        bytes
    }

    #[test]
    fn roundtrip_through_filters() {
        let bytes = write(&[Filter::from(ZlibCodec {
            level: ZlibLevel::ZLevel4,
        })]);
        assert_eq!(bytes.get(..4), Some(MAGIC.as_slice()));
        assert_eq!(bytes.get(4), Some(&VERSION));

        let container = ContainerReader::from_bytes(&bytes).unwrap();
        assert_eq!(container.group_names().collect::<Vec<_>>(), ["data"]);

        let group = container.group("data").unwrap();
        assert_eq!(
            group.dimensions().collect::<Vec<_>>(),
            [("wvl", 4), ("feature", 3)]
        );
        assert_eq!(
            group.text_list_attribute("flabels").unwrap(),
            ["a", "b", "c"]
        );
        assert_eq!(
            group.read_variable("table").unwrap(),
            AnyArray::F64(table())
        );
    }

    #[test]
    fn deterministic_bytes() {
        let filters = [
            Filter::from(BitGroomCodec {
                significant_digits: NonZeroU8::MIN.saturating_add(2),
            }),
            Filter::from(ZlibCodec {
                level: ZlibLevel::ZBestCompression,
            }),
        ];

        assert_eq!(write(&filters), write(&filters));
    }

    #[test]
    fn duplicate_and_unknown_names() {
        let mut container = ContainerWriter::new();
        let mut group = container.create_group("data").unwrap();
        group.create_dimension("x", 2).unwrap();

        assert!(matches!(
            group.create_dimension("x", 3),
            Err(ContainerError::DuplicateName { .. })
        ));
        assert!(matches!(
            group.put_variable(
                "y",
                &["y"],
                AnyArrayDType::F64,
                Vec::new(),
                AnyArray::F64(array![1.0, 2.0].into_dyn()).into_cow(),
            ),
            Err(ContainerError::UnknownDimension { .. })
        ));
        assert!(matches!(
            group.put_variable(
                "x",
                &["x"],
                AnyArrayDType::F64,
                Vec::new(),
                AnyArray::F64(array![1.0, 2.0, 3.0].into_dyn()).into_cow(),
            ),
            Err(ContainerError::ShapeMismatch { .. })
        ));

        assert!(matches!(
            container.create_group("data"),
            Err(ContainerError::DuplicateName { .. })
        ));
    }

    #[test]
    fn missing_entries() {
        let bytes = write(&[]);
        let container = ContainerReader::from_bytes(&bytes).unwrap();

        assert!(matches!(
            container.group("other"),
            Err(ContainerError::MissingGroup { .. })
        ));

        let group = container.group("data").unwrap();
        assert!(matches!(
            group.read_variable("wvl"),
            Err(ContainerError::MissingVariable { .. })
        ));
        assert!(matches!(
            group.attribute("units"),
            Err(ContainerError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn corrupted_containers() {
        let bytes = write(&[Filter::from(ZlibCodec {
            level: ZlibLevel::ZLevel4,
        })]);

        assert!(matches!(
            ContainerReader::from_bytes(b"NOPE"),
            Err(ContainerError::BadMagic { .. })
        ));

        let mut future = bytes.clone();
        if let Some(version) = future.get_mut(4) {
            *version = VERSION + 1;
        }
        assert!(matches!(
            ContainerReader::from_bytes(&future),
            Err(ContainerError::UnsupportedVersion { .. })
        ));

        assert!(matches!(
            ContainerReader::from_bytes(bytes.get(..20).unwrap()),
            Err(ContainerError::Truncated)
        ));

        let mut garbled = bytes.clone();
        if let Some(byte) = garbled.get_mut(13) {
            *byte = b'[';
        }
        assert!(matches!(
            ContainerReader::from_bytes(&garbled),
            Err(ContainerError::Header { .. })
        ));

        let mut truncated = bytes;
        let last = truncated.len() - 1;
        truncated.truncate(last);
        let container = ContainerReader::from_bytes(&truncated).unwrap();
        assert!(matches!(
            container.group("data").unwrap().read_variable("table"),
            Err(ContainerError::PayloadOutOfBounds { .. })
        ));
    }
}

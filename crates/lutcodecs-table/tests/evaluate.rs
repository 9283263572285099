#![expect(missing_docs)]

use ::{
    log as _, lutcodecs as _, lutcodecs_bitgroom as _, lutcodecs_container as _,
    lutcodecs_round as _, lutcodecs_zlib as _, lutcodecs_zstd as _, schemars as _, serde as _,
    thiserror as _,
};

use std::num::NonZeroU8;

use indexmap::IndexMap;
use lutcodecs_table::{
    Compressor, Coordinate, EncodingPolicy, EvaluationConfig, Evaluator, LabeledArray,
    ReportEntry, TableError,
};
use ndarray::{array, Array};
use serde_json::json;

fn scenario() -> LabeledArray {
    LabeledArray::new(
        vec![String::from("batch"), String::from("feature")],
        vec![
            Coordinate::from(vec![0.0, 1.0]),
            Coordinate::from(vec!["a", "b", "c"]),
        ],
        array![[1.234, 2.345, 3.456], [4.567, 5.678, 6.789]].into_dyn(),
    )
    .unwrap()
}

fn profile_table() -> LabeledArray {
    let data = Array::from_shape_fn((3, 8, 4), |(t, l, f)| {
        let (t, l, f) = (
            f64::from(u8::try_from(t).unwrap()),
            f64::from(u8::try_from(l).unwrap()),
            f64::from(u8::try_from(f).unwrap()),
        );
        (f + 1.0) * 123.456_789 * (l * 0.4 + t).cos().mul_add(0.25, 1.0)
    });

    LabeledArray::new(
        vec![
            String::from("time"),
            String::from("level"),
            String::from("feature"),
        ],
        vec![
            Coordinate::from(vec![0.0, 1.0, 2.0]),
            Coordinate::from(vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0]),
            Coordinate::from(vec!["sw_up", "sw_dn", "lw_up", "lw_dn"]),
        ],
        data.into_dyn(),
    )
    .unwrap()
}

#[test]
fn lossless_baseline_against_quantization() {
    std::mem::drop(simple_logger::init());

    let dir = tempfile::tempdir().unwrap();

    let mut policies = IndexMap::new();
    policies.insert(String::from("f8"), EncodingPolicy::default());
    policies.insert(
        String::from("q1"),
        EncodingPolicy::default().with_quantization(NonZeroU8::MIN),
    );

    let report = Evaluator::new(dir.path(), "sflux")
        .evaluate(&scenario(), &policies, "f8")
        .unwrap();

    let f8 = report.measurement("f8").unwrap();
    assert_eq!(f8.mean_absolute_error(), Some(0.0));
    assert_eq!(f8.imperfect_rate(), Some(0.0));
    assert_eq!(f8.sample, scenario().data().clone());

    let q1 = report.measurement("q1").unwrap();
    assert!(q1.mean_absolute_error().unwrap() > 0.0);
    assert_eq!(q1.deviation(), Some(&(&q1.sample - scenario().data())));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn failing_policy_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();

    let mut policies = IndexMap::new();
    policies.insert(String::from("f8"), EncodingPolicy::default());
    policies.insert(
        String::from("bad"),
        EncodingPolicy::default()
            .with_compressor(Compressor::Zstd)
            .with_compression_level(1000),
    );
    policies.insert(
        String::from("zlib"),
        EncodingPolicy::default().with_compressor(Compressor::Zlib),
    );

    let report = Evaluator::new(dir.path(), "sflux")
        .evaluate(&profile_table(), &policies, "f8")
        .unwrap();

    assert_eq!(
        report.entries.keys().collect::<Vec<_>>(),
        ["f8", "bad", "zlib"]
    );
    assert!(matches!(
        report.entries["bad"],
        ReportEntry::Failed {
            error: TableError::InvalidPolicy { .. }
        }
    ));
    assert_eq!(
        report.failed().map(|(name, _)| name).collect::<Vec<_>>(),
        ["bad"]
    );

    let zlib = report.measurement("zlib").unwrap();
    assert_eq!(zlib.mean_absolute_error(), Some(0.0));
    assert!(zlib.size_ratio_to_largest >= 1.0);
    assert!(report
        .measured()
        .any(|(_, measurement)| measurement.size_ratio_to_largest == 1.0));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn failing_baseline_still_reports_sizes() {
    let dir = tempfile::tempdir().unwrap();

    let mut policies = IndexMap::new();
    policies.insert(String::from("f8"), EncodingPolicy::default());
    policies.insert(
        String::from("bad"),
        EncodingPolicy::default().with_compression_level(4),
    );
    policies.insert(
        String::from("zlib"),
        EncodingPolicy::default().with_compressor(Compressor::Zlib),
    );

    let report = Evaluator::new(dir.path(), "sflux")
        .evaluate(&profile_table(), &policies, "bad")
        .unwrap();

    assert!(!report.has_baseline());
    assert_eq!(
        report.failed().map(|(name, _)| name).collect::<Vec<_>>(),
        ["bad"]
    );

    assert_eq!(
        report.measured().map(|(name, _)| name).collect::<Vec<_>>(),
        ["f8", "zlib"]
    );
    for (name, measurement) in report.measured() {
        assert!(measurement.byte_size > 0, "{name}");
        assert!(measurement.size_ratio_to_largest >= 1.0, "{name}");
        assert_eq!(measurement.fidelity, None, "{name}");
        assert!(report.error_curve(name, -1).is_none(), "{name}");
    }

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["baseline"], json!("bad"));
    assert!(json["entries"]["bad"]["failed"]["error"].is_string());
    assert!(json["entries"]["f8"]["measured"]["byte_size"].is_u64());
    assert!(json["entries"]["f8"]["measured"]
        .get("mean_absolute_error")
        .is_none());

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn standard_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let array = profile_table();

    let report = EvaluationConfig::standard("sflux")
        .evaluate(dir.path(), &array)
        .unwrap();

    assert_eq!(report.failed().count(), 0);
    assert_eq!(report.entries.len(), 9);

    for lossless in ["f8", "zlib"] {
        let measurement = report.measurement(lossless).unwrap();
        assert_eq!(measurement.mean_absolute_error(), Some(0.0), "{lossless}");
        assert_eq!(measurement.sample.shape(), [8, 4]);
    }

    let mae = |name| {
        report
            .measurement(name)
            .and_then(lutcodecs_table::Measurement::mean_absolute_error)
            .unwrap()
    };
    assert!(mae("q1") >= mae("q3"));
    assert!(mae("q3") >= mae("q5"));
    assert!(mae("r1") >= mae("r3"));
    assert!(mae("r3") >= mae("r5"));
    assert!(mae("r5") <= 0.5e-5);

    let (names, stacked) = report.stacked_samples().unwrap();
    assert_eq!(names.len(), 9);
    assert_eq!(stacked.shape(), [9, 8, 4]);

    // outgoing flux of the last feature
    let curve = report.error_curve("q1", -1).unwrap();
    assert_eq!(curve.len(), 8);
    assert_eq!(Some(curve), report.error_curve("q1", 3));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["baseline"], json!("f8"));
    assert_eq!(json["entries"]["f8"]["measured"]["mean_absolute_error"], json!(0.0));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

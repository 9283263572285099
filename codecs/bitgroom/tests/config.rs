#![expect(missing_docs)]

use ::{ndarray as _, schemars as _, serde as _, thiserror as _};

use lutcodecs::{codec_from_config_with_id, Codec, StaticCodec};
use lutcodecs_bitgroom::BitGroomCodec;
use serde_json::json;

#[test]
#[should_panic(expected = "missing field `significant_digits`")]
fn empty_config() {
    let _ = BitGroomCodec::from_config(json!({})).unwrap();
}

#[test]
#[should_panic(expected = "invalid value")]
fn zero_significant_digits() {
    let _ = BitGroomCodec::from_config(json!({ "significant_digits": 0 })).unwrap();
}

#[test]
fn config_with_id() {
    let codec = codec_from_config_with_id::<BitGroomCodec, _>(json!({
        "id": "bitgroom",
        "significant_digits": 3,
    }))
    .unwrap();
    assert_eq!(codec.significant_digits.get(), 3);

    let config = codec.get_config(serde_json::value::Serializer).unwrap();
    assert_eq!(config, json!({ "id": "bitgroom", "significant_digits": 3 }));
}

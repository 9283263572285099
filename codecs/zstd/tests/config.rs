#![expect(missing_docs)]

use ::{ndarray as _, postcard as _, schemars as _, serde as _, thiserror as _, zstd as _};

use lutcodecs::{codec_from_config_with_id, Codec, StaticCodec};
use lutcodecs_zstd::ZstdCodec;
use serde_json::json;

#[test]
#[should_panic(expected = "missing field `level`")]
fn empty_config() {
    let _ = ZstdCodec::from_config(json!({})).unwrap();
}

#[test]
#[should_panic(expected = "level 1000 is not in")]
fn level_out_of_range() {
    let _ = ZstdCodec::from_config(json!({ "level": 1000 })).unwrap();
}

#[test]
#[should_panic(expected = "unknown field `clevel`")]
fn unknown_field() {
    let _ = ZstdCodec::from_config(json!({ "level": 3, "clevel": 3 })).unwrap();
}

#[test]
fn config_with_id() {
    let codec = codec_from_config_with_id::<ZstdCodec, _>(json!({
        "id": "zstd",
        "level": 7,
    }))
    .unwrap();
    assert_eq!(codec.level.get(), 7);

    let config = codec.get_config(serde_json::value::Serializer).unwrap();
    assert_eq!(config, json!({ "id": "zstd", "level": 7 }));
}

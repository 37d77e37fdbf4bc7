//! Byte-exact end-to-end vectors straight off the container's own grammar —
//! each one pins the tree encoder's output against a literal expected byte
//! sequence rather than just asserting a round trip, so a tag-table or
//! stream-shape regression shows up immediately instead of only failing a
//! much later property test.

use bvf::encoder::{EncodeOptions as TreeEncodeOptions, Encoder as TreeEncoder};
use bvf::header::Endianness;
use bvf::value::Value;
use bvf::{DecodeOptions, Decoder, EncodeOptions, Encoder};

#[test]
fn null_value_emits_minimal_streams() {
    let streams = TreeEncoder::new(TreeEncodeOptions::default()).encode(&Value::Null).unwrap();
    assert_eq!(streams.value_stream, vec![0xC0, 0xC4]);
    assert_eq!(streams.string_stream, vec![0x90, 0xC4]);
}

#[test]
fn small_array_uses_fixed_array_tag() {
    let value = Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
    let streams = TreeEncoder::new(TreeEncodeOptions::default()).encode(&value).unwrap();
    assert_eq!(streams.value_stream, vec![0x93, 0x01, 0x02, 0x03, 0xC4]);
}

#[test]
fn object_keys_and_values_intern_through_the_shared_string_table() {
    let value = Value::Object(vec![("foo".into(), Value::Str("bar".into()))]);
    let streams = TreeEncoder::new(TreeEncodeOptions::default()).encode(&value).unwrap();
    assert_eq!(streams.value_stream, vec![0x81, 0xB0, 0xB1, 0xC4]);
    assert_eq!(
        streams.string_stream,
        vec![0x92, 0xB3, b'f', b'o', b'o', 0xB3, b'b', b'a', b'r', 0xC4]
    );
}

#[test]
fn stripped_keys_route_through_the_out_of_band_key_table_instead() {
    let value = Value::Object(vec![("x".into(), Value::UInt(1))]);
    let options = TreeEncodeOptions { strip_keys: true, ..TreeEncodeOptions::default() };
    let streams = TreeEncoder::new(options).encode(&value).unwrap();
    assert_eq!(streams.value_stream, vec![0x81, 0xA0, 0x01, 0xC4]);
    assert_eq!(streams.string_stream, vec![0x90, 0xC4]);
    assert_eq!(streams.key_table.as_deref(), Some(["x".to_string()].as_slice()));
}

#[test]
fn epoch_timestamp_uses_the_four_byte_wire_width() {
    let value = Value::Timestamp { sec: 0, nsec: 0 };
    let streams = TreeEncoder::new(TreeEncodeOptions::default()).encode(&value).unwrap();
    assert_eq!(streams.value_stream, vec![0xDD, 0x04, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xC4]);
}

#[test]
fn big_endian_tree_encode_matches_little_endian_up_to_byte_order() {
    let value = Value::Array(vec![Value::UInt(300)]);
    let le = TreeEncoder::new(TreeEncodeOptions { endianness: Endianness::Little, ..TreeEncodeOptions::default() })
        .encode(&value)
        .unwrap();
    let be = TreeEncoder::new(TreeEncodeOptions { endianness: Endianness::Big, ..TreeEncodeOptions::default() })
        .encode(&value)
        .unwrap();
    // 300 needs UINT16; only the two payload bytes should differ in order.
    assert_eq!(le.value_stream[0], be.value_stream[0]);
    assert_eq!(le.value_stream[1], be.value_stream[1]);
    assert_eq!(le.value_stream[2..4], [0x2C, 0x01]);
    assert_eq!(be.value_stream[2..4], [0x01, 0x2C]);
}

#[test]
fn full_pipeline_round_trips_compressed_checksummed_encrypted_container() {
    let value = Value::Object(vec![("a".into(), Value::UInt(1))]);
    let options = EncodeOptions {
        compress: true,
        checksum: true,
        encryption_seed: Some(0x1234_5678),
        ..EncodeOptions::default()
    };
    let bytes = Encoder::new(options).encode(&value).unwrap();

    let decoded = Decoder::new(DecodeOptions::default()).decode(&bytes).unwrap();
    assert_eq!(decoded.value, value);
}

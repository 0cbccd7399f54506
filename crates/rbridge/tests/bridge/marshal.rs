//! Encoder/decoder behaviour across the wire boundary.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use rbridge::value::attr;
use rbridge::{
    BridgeConfig, Decoder, Encoder, ForeignObjectBuilder, NoObjects, RString, RValue, VectorData,
    WireValue,
};
use rbridge_protocol::Array;

use crate::common::*;

fn encode(value: &RValue) -> WireValue {
    Encoder::default().encode(value)
}

fn decode(wire: &WireValue) -> RValue {
    Decoder::new(&NoObjects, &BridgeConfig::default()).decode(wire)
}

fn roundtrip(value: &RValue) -> RValue {
    decode(&encode(value))
}

/// Encode, push through JSON as the host would see it, decode.
fn roundtrip_json(value: &RValue) -> RValue {
    let json = serde_json::to_string(&encode(value)).unwrap();
    decode(&serde_json::from_str(&json).unwrap())
}

proptest! {
    #[test]
    fn prop_integer_roundtrip(n in any::<i32>()) {
        prop_assert_eq!(roundtrip_json(&RValue::integer(n)), RValue::integer(n));
    }

    #[test]
    fn prop_real_roundtrip(x in -1.0e12f64..1.0e12) {
        prop_assert_eq!(roundtrip(&RValue::real(x)), RValue::real(x));
    }

    #[test]
    fn prop_logical_roundtrip(b in any::<bool>()) {
        prop_assert_eq!(roundtrip(&RValue::logical(b)), RValue::logical(b));
    }

    #[test]
    fn prop_string_roundtrip(s in "\\PC*") {
        prop_assert_eq!(roundtrip_json(&RValue::string(s.as_str())), RValue::string(s.as_str()));
    }

    #[test]
    fn prop_complex_roundtrip(re in -1.0e6f64..1.0e6, im in -1.0e6f64..1.0e6) {
        prop_assert_eq!(roundtrip(&RValue::complex(re, im)), RValue::complex(re, im));
    }

    #[test]
    fn prop_integer_vector_roundtrip(v in proptest::collection::vec(proptest::option::of(any::<i32>()), 2..20)) {
        // At least one typed element pins the vector kind.
        let mut v = v;
        v[0] = Some(v[0].unwrap_or(0));
        let value = RValue::vector(VectorData::Integer(v));
        prop_assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_na_fidelity_per_kind() {
    let vectors = vec![
        RValue::vector(VectorData::Logical(vec![Some(true), None])),
        RValue::vector(VectorData::Integer(vec![None, Some(4)])),
        RValue::vector(VectorData::Real(vec![Some(1.5), None])),
        RValue::vector(VectorData::Character(vec![None, Some(RString::from("a"))])),
        RValue::vector(VectorData::Complex(vec![None, Some(rbridge::value::Complex { re: 1.0, im: 1.0 })])),
    ];
    for value in vectors {
        assert_eq!(roundtrip_json(&value), value);
    }

    assert_eq!(roundtrip(&RValue::na_integer()), RValue::na_integer());
}

#[test]
fn test_untyped_na_decodes_as_integer() {
    // A lone NA carries no element kind on the wire.
    let lone = vec![
        RValue::vector(VectorData::Real(vec![None])),
        RValue::vector(VectorData::Character(vec![None])),
        RValue::vector(VectorData::Logical(vec![None])),
    ];
    for value in lone {
        assert_eq!(encode(&value), WireValue::na());
        assert_eq!(roundtrip_json(&value), RValue::na_integer());
    }

    let all_na = vec![
        RValue::vector(VectorData::Real(vec![None, None])),
        RValue::vector(VectorData::Character(vec![None, None, None])),
        RValue::vector(VectorData::Logical(vec![None, None])),
    ];
    for value in all_na {
        let expected = RValue::vector(VectorData::Integer(vec![None; value.len()]));
        assert_eq!(roundtrip_json(&value), expected);
    }
}

#[test]
fn test_non_finite_reals_survive_json() {
    for x in [f64::INFINITY, f64::NEG_INFINITY] {
        assert_eq!(roundtrip_json(&RValue::real(x)), RValue::real(x));
    }
    let nan = roundtrip_json(&RValue::real(f64::NAN));
    assert!(nan.as_real().is_some_and(f64::is_nan));

    let mixed = RValue::reals([1.0, f64::INFINITY, f64::NEG_INFINITY]);
    assert_eq!(roundtrip_json(&mixed), mixed);

    let z = RValue::complex(f64::INFINITY, -1.0);
    assert_eq!(roundtrip_json(&z), z);
}

#[test]
fn test_degenerate_array_reads_flat() {
    let data: Vec<WireValue> = (1..=4).map(WireValue::integer).collect();
    let value = decode(&WireValue::array(Array::matrix(3, 3, data)));
    assert_eq!(value.len(), 4);
    assert_eq!(value.dim(), None);
    assert_eq!(value, RValue::integers([1, 2, 3, 4]));
}

#[test]
fn test_factor_encodes_level_strings() {
    let factor = RValue::factor(vec![Some(2), Some(1), Some(3)], ["a", "b", "c"]);
    let array = encode(&factor).as_array().cloned().unwrap();
    let strings: Vec<&str> = array.data.iter().filter_map(WireValue::as_str).collect();
    assert_eq!(strings, vec!["b", "a", "c"]);

    let out_of_range = RValue::factor(vec![Some(0), Some(4)], ["a", "b", "c"]);
    let array = encode(&out_of_range).as_array().cloned().unwrap();
    assert_eq!(array.data, vec![WireValue::integer(0), WireValue::integer(4)]);
}

#[test]
fn test_mixed_vector_stays_generic() {
    let array = Array::flat(vec![WireValue::integer(1), WireValue::string("x"), WireValue::nil()]);
    let value = decode(&WireValue::array(array));
    assert!(value.is_list());
    assert_eq!(value.len(), 3);
    assert_eq!(
        value.as_list().unwrap(),
        &[RValue::integer(1), RValue::string("x"), RValue::Null]
    );
}

#[test]
fn test_positional_names_with_gaps() {
    let array = Array::flat(vec![
        WireValue::string("a"),
        WireValue::string("b").with_name("middle"),
        WireValue::string("c"),
    ]);
    let value = decode(&WireValue::array(array));
    assert_eq!(
        value.names().unwrap(),
        vec!["".to_string(), "middle".to_string(), "".to_string()]
    );
}

#[test]
fn test_table_encode_layout() {
    let table = RValue::data_frame(vec![
        ("x", RValue::reals([1.0, 2.0, 3.0])),
        ("y", RValue::strings(["p", "q", "r"])),
    ]);
    let array = encode(&table).as_array().cloned().unwrap();
    assert_eq!((array.rows, array.cols), (3, 2));
    assert_eq!(array.colnames.len(), 2);
    assert_eq!(
        array.data,
        vec![
            WireValue::real(1.0),
            WireValue::real(2.0),
            WireValue::real(3.0),
            WireValue::string("p"),
            WireValue::string("q"),
            WireValue::string("r"),
        ]
    );
}

#[test]
fn test_empty_table_has_no_rows() {
    let table = RValue::named_list(Vec::<(&str, RValue)>::new())
        .with_attr(attr::CLASS, RValue::string("data.frame"));
    // Zero-length values encode as nil before frame detection.
    assert_eq!(encode(&table), WireValue::nil());
}

#[test]
fn test_matrix_roundtrip_keeps_dimnames() {
    let matrix = RValue::matrix(VectorData::Integer((1..=6).map(Some).collect()), 2, 3).with_attr(
        attr::DIMNAMES,
        RValue::list(vec![RValue::strings(["r1", "r2"]), RValue::strings(["a", "b", "c"])]),
    );
    assert_eq!(roundtrip_json(&matrix), matrix);
}

#[test]
fn test_named_list_roundtrip() {
    let list = RValue::named_list(vec![
        ("count", RValue::integer(3)),
        ("label", RValue::string("total")),
        ("nested", RValue::list(vec![RValue::logical(true), RValue::Null])),
    ]);
    assert_eq!(roundtrip_json(&list), list);
}

#[test]
fn test_invalid_utf8_never_reaches_the_wire() {
    let value = RValue::vector(VectorData::Character(vec![
        Some(RString::from_bytes(b"Gr\xfc\xdfe".to_vec())),
        Some(RString::from("ok")),
    ]));
    let wire = encode(&value);
    let json = serde_json::to_string(&wire).unwrap();
    assert!(json.contains("Grüße"));

    let latin = Encoder::new(&BridgeConfig {
        legacy_code_page: rbridge::CodePage::Latin1,
        ..BridgeConfig::default()
    });
    let wire = latin.encode(&RValue::string(RString::from_bytes(vec![0x80])));
    assert_eq!(wire, WireValue::string("\u{80}"));
}

#[test]
fn test_foreign_accessors_keyed_by_kind() {
    let object = ForeignObjectBuilder::new("Range", 0x10)
        .property_get("Value", 6)
        .property_put("Value", 6)
        .method("Clear", 111, &[])
        .build();
    let value = decode(&WireValue::foreign(object));
    let functions = value.get("functions").unwrap();
    assert_eq!(
        functions.names().unwrap(),
        vec!["get_Value".to_string(), "put_Value".to_string(), "Clear".to_string()]
    );
    assert_eq!(
        functions.get("put_Value").unwrap().get("call.type").and_then(RValue::as_str),
        Some("put")
    );
}

#[test]
fn test_range_roundtrip_through_runtime_class() {
    let runtime = MockRuntime::new().class("xlReference");
    let config = BridgeConfig::default();
    let range = rbridge_protocol::RangeRef {
        start_row: 0,
        start_column: 1,
        end_row: 9,
        end_column: 4,
        sheet_id: 0xFFFF_0000_8000_0001,
    };
    let wire = WireValue::range(range);
    let value = Decoder::new(&runtime, &config).decode(&wire);
    assert_eq!(Encoder::new(&config).encode(&value), wire);

    // Without the class the range cannot be represented.
    assert_eq!(decode(&wire), RValue::Null);
}

#[test]
fn test_non_na_errors_decode_to_null() {
    for kind in [
        rbridge_protocol::ErrorKind::Generic,
        rbridge_protocol::ErrorKind::Value,
        rbridge_protocol::ErrorKind::Ref,
    ] {
        assert_eq!(decode(&WireValue::error(kind)), RValue::Null);
    }
}

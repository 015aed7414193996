//! Property-based tests for the canonical encoders and path escaping.

mod support;

use ipld_stream::bind::{read_links, BaseLink};
use ipld_stream::codec::{self, cbor};
use ipld_stream::path::{join_path, split_path};
use ipld_stream::{extract_links, EncodeOptions, NodeMap, Value};
use num_bigint::BigInt;
use proptest::prelude::*;
use std::io::Cursor;
use support::{H1, H2};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        any::<i128>().prop_map(|i| Value::normalize_bigint(BigInt::from(i))),
        (-1.0e6f32..1.0e6f32).prop_map(Value::F32),
        (-1.0e12f64..1.0e12f64).prop_map(Value::F64),
        "[a-z0-9 ]{0,12}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        prop_oneof![Just(H1), Just(H2)].prop_map(|h| {
            let mut link = NodeMap::new();
            link.insert("@link".to_string(), Value::from(h));
            Value::Map(link)
        }),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6)
                .prop_map(|entries| Value::Map(entries.into_iter().collect())),
        ]
    })
}

fn arb_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z]{1,8}", arb_scalar(), 0..10)
        .prop_map(|map| map.into_iter().collect())
}

fn decode_body(body: &[u8]) -> Value {
    let mut reader = cbor::CborDecoder::new(Cursor::new(body.to_vec()));
    Value::from_reader(&mut reader).unwrap()
}

proptest! {
    #[test]
    fn prop_cbor_round_trip(value in arb_value()) {
        let body = cbor::to_vec(&value, true);
        prop_assert_eq!(decode_body(&body), value);
    }

    #[test]
    fn prop_cbor_is_idempotent(value in arb_value()) {
        let body = cbor::to_vec(&value, true);
        let again = cbor::to_vec(&decode_body(&body), true);
        prop_assert_eq!(again, body);
    }

    #[test]
    fn prop_cbor_ignores_insertion_order(entries in arb_entries()) {
        let forward: NodeMap = entries.iter().cloned().collect();
        let backward: NodeMap = entries.into_iter().rev().collect();
        prop_assert_eq!(
            cbor::to_vec(&Value::Map(forward), true),
            cbor::to_vec(&Value::Map(backward), true)
        );
    }

    #[test]
    fn prop_cbor_is_well_formed(value in arb_value()) {
        for tags in [true, false] {
            let body = cbor::to_vec(&value, tags);
            let parsed: Result<ciborium::value::Value, _> = ciborium::de::from_reader(body.as_slice());
            prop_assert!(parsed.is_ok(), "{:?}", parsed);
        }
    }

    #[test]
    fn prop_framed_round_trip(value in arb_value()) {
        let bytes = codec::encode_bytes(&EncodeOptions::new(), &value).unwrap();
        let decoded = Value::from_reader(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn prop_path_escaping(components in prop::collection::vec("[a-c/\\\\]{1,6}", 1..6)) {
        prop_assert_eq!(split_path(&join_path(&components)), components);
    }

    #[test]
    fn prop_read_links_agrees_with_extract_links(value in arb_value()) {
        let mut reader = &value;
        let mut streamed: Vec<(String, String)> = read_links::<BaseLink, _>(&mut reader)
            .unwrap()
            .into_iter()
            .map(|l| (join_path(&l.string_path), l.link))
            .collect();
        streamed.sort();
        let materialized: Vec<(String, String)> = extract_links(&value)
            .into_iter()
            .map(|(path, link)| (path, link.target().to_string()))
            .collect();
        prop_assert_eq!(streamed, materialized);
    }
}

mod support;

use ipld_stream::codec::{self, cbor};
use ipld_stream::stream::{iterate, record_tokens, NodeIterator, ReaderAt, Token};
use ipld_stream::{ipld, EncodeOptions, Error, PathSegment, Value};
use std::io::Cursor;
use std::time::{Duration, Instant};
use support::{linked_tree, H2};

fn long_stream() -> Vec<u8> {
    let items: Vec<Value> = (0..300u64).map(|i| ipld!({"n": i})).collect();
    codec::encode_bytes(&EncodeOptions::new(), &Value::List(items)).unwrap()
}

#[test]
fn test_close_after_first_event() {
    let reader = codec::decode_bytes(&long_stream()).unwrap();
    let started = Instant::now();
    let mut it = NodeIterator::spawn(reader);
    let first = it.advance().unwrap();
    assert_eq!(first.token, Token::BeginArray);
    assert!(it.close().is_ok());
    assert!(it.is_done());
    assert!(it.advance().is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_drop_without_close() {
    let reader = codec::decode_bytes(&long_stream()).unwrap();
    let mut it = NodeIterator::spawn(reader);
    for _ in 0..10 {
        assert!(it.advance().is_some());
    }
    drop(it);
}

#[test]
fn test_iterator_sees_every_token() {
    let bytes = long_stream();
    let mut reader = codec::decode_bytes(&bytes).unwrap();
    let expected = record_tokens(&mut reader).unwrap();
    let count = NodeIterator::spawn(reader).count();
    assert_eq!(count, expected.len());
    assert_eq!(count, 2 + 300 * 5);
}

#[test]
fn test_skip_through_the_bridge() {
    let mut tree = linked_tree();
    let keys = iterate(&mut tree, |it| {
        let mut keys = Vec::new();
        while let Some(item) = it.advance() {
            if let Token::Key(k) = &item.token {
                keys.push(item.string_path() + "/" + k);
                if item.path.is_empty() && k != "name" {
                    it.skip();
                }
            }
        }
        Ok(keys)
    })
    .unwrap();
    assert_eq!(keys, vec!["/links", "/meta", "/name", "/nested"]);
}

#[test]
fn test_item_conversions() {
    let mut tree = ipld!({"big": 300, "text": "t", "ratio": 0.25});
    let items: Vec<_> = iterate(&mut tree, |it| Ok(it.collect::<Vec<_>>())).unwrap();
    let big = items.iter().find(|i| i.string_path() == "big" && i.value().is_some()).unwrap();
    assert_eq!(big.to_u64(), Some(300));
    assert_eq!(big.to_i64(), Some(300));
    assert_eq!(big.to_str(), None);
    let text = items.iter().find(|i| i.string_path() == "text" && i.value().is_some()).unwrap();
    assert_eq!(text.to_str(), Some("t"));
    let ratio = items.iter().find(|i| i.string_path() == "ratio" && i.value().is_some()).unwrap();
    assert_eq!(ratio.to_f64(), Some(0.25));
    assert_eq!(ratio.to_i64(), None);
}

#[test]
fn test_reader_error_reaches_consumer() {
    let bytes = long_stream();
    let reader = codec::decode_bytes(&bytes[..bytes.len() / 2]).unwrap();
    let mut it = NodeIterator::spawn(reader);
    while it.advance().is_some() {}
    assert!(matches!(it.error(), Some(Error::MalformedWire { .. })));
    assert!(it.close().is_err());
}

#[test]
fn test_consumer_error_wins() {
    let mut tree = linked_tree();
    let result: Result<(), Error> = iterate(&mut tree, |it| {
        it.advance();
        Err(Error::custom("consumer gave up"))
    });
    assert!(matches!(result, Err(Error::Custom(msg)) if msg == "consumer gave up"));
}

#[test]
fn test_reader_at_decoded_stream() {
    let body = cbor::to_vec(&linked_tree(), true);
    let decoder = cbor::CborDecoder::seekable(Cursor::new(body)).unwrap();
    let mut at = ReaderAt::new(decoder, &[PathSegment::from("meta"), PathSegment::from("owner")]);
    assert_eq!(Value::from_reader(&mut at).unwrap(), ipld!({"@link": H2}));

    let mut at = ReaderAt::from_str_path(at.into_inner(), "links/1/size");
    assert_eq!(Value::from_reader(&mut at).unwrap(), Value::from(20));

    let mut missing = ReaderAt::from_str_path(at.into_inner(), "meta/nobody");
    assert!(matches!(Value::from_reader(&mut missing), Err(Error::NotFound(_))));
}

#[test]
fn test_reader_at_paths_are_rerooted() {
    let tree = linked_tree();
    let mut at = ReaderAt::from_str_path(&tree, "meta");
    let events = record_tokens(&mut at).unwrap();
    assert_eq!(events.first(), Some(&(String::new(), Token::BeginNode)));
    assert!(events.iter().any(|(path, _)| path == "tags/1"));
    assert!(events.iter().all(|(path, _)| !path.starts_with("meta")));
}

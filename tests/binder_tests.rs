mod support;

use ipld_stream::bind::{read_links, unmarshal, BaseLink, Bind, Schema, SimpleHashLink, SimpleLink};
use ipld_stream::codec;
use ipld_stream::link::decode_multihash;
use ipld_stream::{extract_links, ipld, Codec, EncodeOptions, Error, Value};
use support::{linked_tree, H1, H2};

#[derive(Debug, Default, PartialEq)]
struct Node {
    links: Vec<SimpleLink>,
    data: String,
}

impl Bind for Node {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .records("links", |n| &mut n.links)
            .key("data", |n| &mut n.data)
    }
}

#[derive(Debug, Default)]
struct PbLink {
    hash: SimpleHashLink,
    name: String,
    size: u64,
}

impl Bind for PbLink {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .flatten(|l| &mut l.hash)
            .key("name", |l| &mut l.name)
            .key("size", |l| &mut l.size)
    }
}

#[derive(Debug, Default)]
struct PbNode {
    links: Vec<PbLink>,
    data: Vec<u8>,
}

impl Bind for PbNode {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .records("links", |n| &mut n.links)
            .key("data", |n| &mut n.data)
    }
}

#[derive(Debug, Default)]
struct Meta {
    owner: SimpleLink,
    tags: Value,
}

impl Bind for Meta {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .record("owner", |m| &mut m.owner)
            .value("tags", |m| &mut m.tags)
    }
}

#[derive(Debug, Default)]
struct Root {
    name: String,
    meta: Meta,
    nested: BaseLink,
}

impl Bind for Root {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .key("name", |r| &mut r.name)
            .record("meta", |r| &mut r.meta)
            .record("nested", |r| &mut r.nested)
    }
}

#[test]
fn test_binding_example_through_codecs() {
    let node = ipld!({
        "links": [{"@link": "Qm1"}, {"@link": "Qm2"}],
        "data": "foobar"
    });
    let expected = Node {
        links: vec![
            SimpleLink {
                link: "Qm1".to_string(),
            },
            SimpleLink {
                link: "Qm2".to_string(),
            },
        ],
        data: "foobar".to_string(),
    };
    for opts in [EncodeOptions::new(), EncodeOptions::json()] {
        let bytes = codec::encode_bytes(&opts, &node).unwrap();
        let bound: Node = unmarshal(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(bound, expected, "{:?}", opts.codec);
    }
}

#[test]
fn test_protobuf_node_into_records() {
    let mut node = ipld!({
        "links": [
            {"@link": H1, "name": "a", "size": 10},
            {"@link": H2, "name": "b", "size": 20}
        ]
    });
    node.as_map_mut()
        .unwrap()
        .insert("data".to_string(), Value::Bytes(b"payload".to_vec()));
    let bytes = codec::encode_bytes(&EncodeOptions::protobuf(), &node).unwrap();
    let bound: PbNode = unmarshal(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();

    assert_eq!(bound.data, b"payload");
    assert_eq!(bound.links.len(), 2);
    assert_eq!(bound.links[0].hash.hash, decode_multihash(H1).unwrap());
    assert_eq!(bound.links[0].name, "a");
    assert_eq!(bound.links[1].size, 20);
}

#[test]
fn test_nested_records() {
    let bytes = codec::encode_bytes(&EncodeOptions::new(), &linked_tree()).unwrap();
    let root: Root = unmarshal(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();
    assert_eq!(root.name, "root");
    assert_eq!(root.meta.owner.link, H2);
    assert_eq!(root.meta.tags, ipld!(["x", "y"]));
    assert_eq!(root.nested.link, H1);
    assert_eq!(root.nested.name, "nested");
    assert_eq!(root.nested.string_path, vec!["nested".to_string()]);
}

#[test]
fn test_read_links_matches_extract_links() {
    let tree = linked_tree();
    let index = extract_links(&tree);

    let expected: Vec<(String, String)> = index
        .iter()
        .map(|(path, link)| (path.clone(), link.target().to_string()))
        .collect();

    let codecs = [
        EncodeOptions::new(),
        EncodeOptions::new().with_codec(Codec::CborNoTags),
        EncodeOptions::json(),
    ];
    for opts in codecs {
        let bytes = codec::encode_bytes(&opts, &tree).unwrap();
        let links: Vec<BaseLink> = read_links(&mut codec::decode_bytes(&bytes).unwrap()).unwrap();
        let mut found: Vec<(String, String)> = links
            .into_iter()
            .map(|l| (l.string_path.join("/"), l.link))
            .collect();
        found.sort();
        assert_eq!(found, expected, "{:?}", opts.codec);
    }
}

#[test]
fn test_read_links_hash_records() {
    let mut tree = linked_tree();
    let hashes: Vec<SimpleHashLink> = read_links(&mut tree).unwrap();
    assert_eq!(hashes.len(), extract_links(&linked_tree()).len());
    assert!(hashes.iter().all(|h| h.hash.code() == 0x12));
}

#[test]
fn test_binding_errors() {
    let node = ipld!({"links": {"not": "a list"}});
    let bytes = codec::encode_bytes(&EncodeOptions::new(), &node).unwrap();
    let result: Result<Node, Error> = unmarshal(&mut codec::decode_bytes(&bytes).unwrap());
    assert!(matches!(
        result,
        Err(Error::TypeMismatch { ref path, ref expected, .. }) if path == "links" && expected == "list"
    ));

    let bytes = codec::encode_bytes(&EncodeOptions::new(), &linked_tree()).unwrap();
    let mut truncated = codec::decode_bytes(&bytes[..bytes.len() - 5]).unwrap();
    let result: Result<Node, Error> = unmarshal(&mut truncated);
    assert!(matches!(result, Err(Error::MalformedWire { .. })));
}

//! The link predicate and owned link records.
//!
//! A link is a mapping that binds the sentinel key [`LINK_KEY`] (`"@link"`)
//! to a string holding a content address. Older trees spell the sentinel
//! [`LEGACY_LINK_KEY`] (`"mlink"`); that spelling is still recognised when
//! reading but is never produced by a decoder.
//!
//! Sibling keys next to the sentinel (a name, a size, custom attributes) are
//! the link's metadata. A link may also have children that are links
//! themselves; traversals keep descending into it.

use crate::{Error, NodeMap, Result, Value};
use multihash::Multihash;

/// Canonical link sentinel key.
pub const LINK_KEY: &str = "@link";

/// Legacy link sentinel key, accepted on read only.
pub const LEGACY_LINK_KEY: &str = "mlink";

/// Multihash with room for digests up to 512 bits.
pub type Hash = Multihash<64>;

/// Returns `true` if `key` is either spelling of the sentinel.
#[must_use]
#[inline]
pub fn is_link_key(key: &str) -> bool {
    key == LINK_KEY || key == LEGACY_LINK_KEY
}

/// Finds the sentinel in a mapping, canonical spelling first.
#[must_use]
pub fn link_target(map: &NodeMap) -> Option<(&'static str, &str)> {
    [LINK_KEY, LEGACY_LINK_KEY]
        .into_iter()
        .find_map(|key| map.get(key).and_then(Value::as_str).map(|s| (key, s)))
}

/// A borrowed view of a mapping known to be a link.
#[derive(Debug, Clone, Copy)]
pub struct LinkRef<'a> {
    key: &'static str,
    target: &'a str,
    node: &'a NodeMap,
}

impl<'a> LinkRef<'a> {
    /// Classifies `map`, returning a view when it satisfies the link predicate.
    #[must_use]
    pub fn from_map(map: &'a NodeMap) -> Option<Self> {
        link_target(map).map(|(key, target)| LinkRef {
            key,
            target,
            node: map,
        })
    }

    /// Sentinel spelling this link was found under.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub const fn target(&self) -> &'a str {
        self.target
    }

    /// The whole mapping, sentinel included.
    #[must_use]
    pub const fn node(&self) -> &'a NodeMap {
        self.node
    }

    /// Sibling entries of the sentinel key.
    pub fn meta(&self) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        let key = self.key;
        self.node.iter().filter(move |(k, _)| k.as_str() != key)
    }

    #[must_use]
    pub fn to_link(&self) -> Link {
        Link {
            key: self.key,
            target: self.target.to_string(),
            meta: self
                .meta()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// An owned link: its target and the metadata stored beside it.
///
/// # Examples
///
/// ```rust
/// use ipld_stream::{Link, Value};
///
/// let link = Link::new("QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo")
///     .with_meta("size", 42u64);
/// assert_eq!(link.size(), Some(42));
///
/// let value = link.to_value();
/// assert!(value.is_link());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    key: &'static str,
    target: String,
    meta: NodeMap,
}

impl Link {
    /// Creates a link under the canonical sentinel key.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Link {
            key: LINK_KEY,
            target: target.into(),
            meta: NodeMap::new(),
        }
    }

    /// Adds a metadata field next to the sentinel.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !is_link_key(key) {
            self.meta.insert(key.to_string(), value.into());
        }
        self
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn meta(&self) -> &NodeMap {
        &self.meta
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// The `name` metadata field, if it is text.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.meta.get("name").and_then(Value::as_str)
    }

    /// The `size` metadata field, if it is a non-negative integer.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.meta.get("size").and_then(Value::as_u64)
    }

    /// Decodes the target as a base-58 multihash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if the target is not one.
    pub fn multihash(&self) -> Result<Hash> {
        decode_multihash(&self.target)
    }

    /// Rebuilds the mapping, sentinel first.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = NodeMap::with_capacity(self.meta.len() + 1);
        map.insert(self.key.to_string(), Value::Text(self.target.clone()));
        map.extend(self.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Map(map)
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Self {
        link.to_value()
    }
}

/// Decodes a base-58 string into a multihash.
///
/// # Errors
///
/// Returns [`Error::SchemaViolation`] if the string is not base-58 or the
/// bytes are not a well-formed multihash.
pub fn decode_multihash(target: &str) -> Result<Hash> {
    let bytes = bs58::decode(target)
        .into_vec()
        .map_err(|e| Error::schema(format!("link {:?} is not base-58: {}", target, e)))?;
    Hash::from_bytes(&bytes)
        .map_err(|e| Error::schema(format!("link {:?} is not a multihash: {}", target, e)))
}

/// Renders a multihash as the base-58 string stored under the sentinel.
#[must_use]
pub fn encode_multihash(hash: &Hash) -> String {
    bs58::encode(hash.to_bytes()).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: &str = "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo";

    #[test]
    fn test_canonical_key_wins() {
        let mut map = NodeMap::new();
        map.insert(LEGACY_LINK_KEY.to_string(), Value::from("old"));
        map.insert(LINK_KEY.to_string(), Value::from("new"));
        assert_eq!(link_target(&map), Some((LINK_KEY, "new")));
    }

    #[test]
    fn test_legacy_key_is_a_link() {
        let mut map = NodeMap::new();
        map.insert(LEGACY_LINK_KEY.to_string(), Value::from(H));
        map.insert("size".to_string(), Value::from(3));
        let link = LinkRef::from_map(&map).unwrap().to_link();
        assert_eq!(link.key(), LEGACY_LINK_KEY);
        assert_eq!(link.size(), Some(3));
        assert_eq!(link.meta().len(), 1);
    }

    #[test]
    fn test_multihash_round_trip() {
        let hash = decode_multihash(H).unwrap();
        assert_eq!(hash.code(), 0x12);
        assert_eq!(hash.digest().len(), 32);
        assert_eq!(encode_multihash(&hash), H);
    }

    #[test]
    fn test_bad_multihash() {
        assert!(matches!(
            decode_multihash("not-base58-0OIl"),
            Err(Error::SchemaViolation(_))
        ));
        assert!(matches!(
            decode_multihash("StV1DL6CwTryKyV"),
            Err(Error::SchemaViolation(_))
        ));
    }
}

//! Collecting every link of a tree into records.

use super::{next_item, Bind, Schema};
use crate::link::{is_link_key, Hash};
use crate::path::Path;
use crate::stream::{iterate, NodeReader, ReadItem, Token};
use crate::{Error, Result, Value};
use tracing::{debug, trace};

/// Everything the binder knows about a link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseLink {
    pub hash: Hash,
    pub link: String,
    pub name: String,
    pub path: Path,
    pub string_path: Vec<String>,
}

impl Bind for BaseLink {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .multihash(|l| &mut l.hash)
            .link(|l| &mut l.link)
            .name(|l| &mut l.name)
            .path(|l| &mut l.path)
            .string_path(|l| &mut l.string_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleLink {
    pub link: String,
}

impl Bind for SimpleLink {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new().link(|l| &mut l.link)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleHashLink {
    pub hash: Hash,
}

impl Bind for SimpleHashLink {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new().multihash(|l| &mut l.hash)
    }
}

/// Binds every node of `reader` that holds a link.
///
/// Each node gets a fresh record with its position slots filled. The
/// record is kept if its link slots took the node's `"@link"` target; a
/// multihash slot alone only takes targets that decode. Scalars under keys
/// with a slot are bound too, unless they do not fit it, in which case the
/// slot keeps its default. Nested scopes are walked as nodes of their
/// own. A node is complete only at its end, so links found inside a linking
/// node come before it.
///
/// ```rust
/// use ipld_stream::bind::{read_links, BaseLink};
/// use ipld_stream::ipld;
///
/// let h = "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo";
/// let mut tree = ipld!({"a": {"@link": h}, "b": [{"@link": h}]});
/// let links: Vec<BaseLink> = read_links(&mut tree).unwrap();
/// let paths: Vec<_> = links.iter().map(|l| l.string_path.join("/")).collect();
/// assert_eq!(paths, vec!["a", "b/0"]);
/// ```
///
/// # Errors
///
/// [`Error::SchemaViolation`] if `T` has neither a link nor a multihash
/// slot; any error of the reader.
pub fn read_links<T, R>(reader: &mut R) -> Result<Vec<T>>
where
    T: Bind,
    R: NodeReader + Send + ?Sized,
{
    let schema = T::schema();
    if !schema.has_link_slot() {
        return Err(Error::schema("record type has no link or multihash slot"));
    }

    let found = iterate(reader, |it| {
        let mut found = Vec::new();
        let mut stack: Vec<(T, bool)> = Vec::new();
        let mut carried: Option<ReadItem> = None;

        loop {
            let item = match carried.take() {
                Some(item) => item,
                None => match it.advance() {
                    Some(item) => item,
                    None => break,
                },
            };
            match &item.token {
                Token::BeginNode => {
                    let mut record = T::default();
                    schema.place(&mut record, &item.path);
                    stack.push((record, false));
                }
                Token::EndNode => {
                    if let Some((record, true)) = stack.pop() {
                        found.push(record);
                    }
                }
                Token::Key(key) if is_link_key(key) => {
                    let value = next_item(it)?;
                    match &value.token {
                        Token::Value(Value::Text(target)) => {
                            if let Some((record, ok)) = stack.last_mut() {
                                if schema.place_link(record, target) {
                                    *ok = true;
                                }
                            }
                        }
                        Token::Value(_) => {}
                        _ => carried = Some(value),
                    }
                }
                Token::Key(key) => {
                    let Some(fill) = schema.filler(key) else {
                        continue;
                    };
                    let value = next_item(it)?;
                    match (value.token.is_begin(), stack.last_mut()) {
                        (false, Some((record, _))) => match fill(record, it, value) {
                            Err(err @ Error::TypeMismatch { .. }) => {
                                trace!(%err, "slot left unbound");
                            }
                            other => other?,
                        },
                        _ => carried = Some(value),
                    }
                }
                _ => {}
            }
        }
        Ok(found)
    })?;

    debug!(count = found.len(), "links read");
    Ok(found)
}

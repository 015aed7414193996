/// Builds a [`Value`](crate::Value) from a JSON-like literal.
///
/// Leaves that are not `null`, `true`, `false`, a list or a mapping go
/// through [`to_value`](crate::to_value), so any `Serialize` expression works.
///
/// ```rust
/// use ipld_stream::{ipld, Value};
///
/// let node = ipld!({
///     "name": "readme",
///     "size": 1024,
///     "tags": ["doc", "text"],
///     "target": {"@link": "QmZku7P7KeeHAnwMr6c4HveYfMzmtVinNXzibkiNbfDbPo"}
/// });
/// assert_eq!(node.get("size"), Some(&Value::from(1024)));
/// assert!(node.get("target").unwrap().is_link());
/// ```
#[macro_export]
macro_rules! ipld {
    (null) => {
        $crate::Value::Null
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::List(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::List(vec![$($crate::ipld!($elem)),*])
    };

    ({}) => {
        $crate::Value::Map($crate::NodeMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut map = $crate::NodeMap::new();
        $(
            map.insert($key.to_string(), $crate::ipld!($value));
        )*
        $crate::Value::Map(map)
    }};

    ($s:expr) => {{
        $crate::to_value(&$s).unwrap_or($crate::Value::Null)
    }};
}

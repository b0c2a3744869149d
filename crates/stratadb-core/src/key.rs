use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, fmt, ops::Bound};
use thiserror::Error as ThisError;

///
/// KeyError
///

#[derive(Clone, Debug, ThisError)]
pub enum KeyError {
    #[error("key number must be finite and not NaN")]
    NonFiniteNumber,

    #[error("empty key path")]
    EmptyKeyPath,

    #[error("key path segment {position} is empty")]
    EmptyKeyPathSegment { position: usize },
}

///
/// Key
///
/// Dynamic, totally ordered key for collections and indexes.
///
/// Ordering is canonical-rank-first (Number < Text < Bytes < List), then
/// value order within a rank. Lists compare elementwise. The rank order is
/// part of deterministic traversal behavior and must remain fixed.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Key {
    Number(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Key>),
}

impl Key {
    /// Construct a numeric key, rejecting NaN.
    pub fn number(value: f64) -> Result<Self, KeyError> {
        if value.is_nan() {
            return Err(KeyError::NonFiniteNumber);
        }
        Ok(Self::Number(value))
    }

    /// Stable rank used for cross-variant ordering.
    #[must_use]
    pub const fn canonical_rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Bytes(_) => 2,
            Self::List(_) => 3,
        }
    }

    /// Convert a record field into a key, if the field holds a keyable value.
    ///
    /// Numbers and strings map directly; arrays map to list keys when every
    /// element is itself keyable. Objects, booleans, and null are not keys.
    #[must_use]
    pub fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                let n = n.as_f64()?;
                Self::number(n).ok()
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_field)
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Value::Null | Value::Bool(_) | Value::Object(_) => None,
        }
    }

    /// Render the key back into a record field value.
    #[must_use]
    pub fn to_field(&self) -> Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::Array(
                b.iter().map(|byte| Value::Number((*byte).into())).collect(),
            ),
            Self::List(items) => Value::Array(items.iter().map(Self::to_field).collect()),
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.cmp(b),
            _ => self.canonical_rank().cmp(&other.canonical_rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Key {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

///
/// KeyRange
///
/// Half-open or closed interval over the key space. The unbounded range
/// matches every key.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
    pub start: Bound<Key>,
    pub end: Bound<Key>,
}

impl KeyRange {
    #[must_use]
    pub const fn new(start: Bound<Key>, end: Bound<Key>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Exact-match singleton range.
    #[must_use]
    pub fn only(key: Key) -> Self {
        Self {
            start: Bound::Included(key.clone()),
            end: Bound::Included(key),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above_start = match &self.start {
            Bound::Included(start) => key >= start,
            Bound::Excluded(start) => key > start,
            Bound::Unbounded => true,
        };
        let below_end = match &self.end {
            Bound::Included(end) => key <= end,
            Bound::Excluded(end) => key < end,
            Bound::Unbounded => true,
        };
        above_start && below_end
    }

    /// True when no key can satisfy the range.
    ///
    /// Ordered-map range queries panic on inverted bounds, so traversals
    /// must check this before iterating.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        let (start, end) = match (&self.start, &self.end) {
            (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
                (s, e)
            }
            _ => return false,
        };

        match start.cmp(end) {
            Ordering::Greater => true,
            Ordering::Equal => !matches!(
                (&self.start, &self.end),
                (Bound::Included(_), Bound::Included(_))
            ),
            Ordering::Less => false,
        }
    }

    /// Borrowed bound pair usable with ordered-map range queries.
    #[must_use]
    pub fn as_bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        (bound_as_ref(&self.start), bound_as_ref(&self.end))
    }
}

const fn bound_as_ref(bound: &Bound<Key>) -> Bound<&Key> {
    match bound {
        Bound::Included(key) => Bound::Included(key),
        Bound::Excluded(key) => Bound::Excluded(key),
        Bound::Unbounded => Bound::Unbounded,
    }
}

///
/// KeyPath
///
/// Dot-separated field path (`"a.b.c"`) evaluated against a record.
/// Used for collection primary keys and index fields.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn parse(path: &str) -> Result<Self, KeyError> {
        if path.is_empty() {
            return Err(KeyError::EmptyKeyPath);
        }

        let mut segments = Vec::new();
        for (position, segment) in path.split('.').enumerate() {
            if segment.is_empty() {
                return Err(KeyError::EmptyKeyPathSegment { position });
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Resolve the record field this path points at.
    #[must_use]
    pub fn resolve<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Extract a single key from a record.
    #[must_use]
    pub fn extract(&self, record: &Value) -> Option<Key> {
        Key::from_field(self.resolve(record)?)
    }

    /// Extract every key contributed by a record under multi-entry rules.
    ///
    /// An array-valued terminal field yields one key per keyable element;
    /// any other keyable field yields a single key.
    #[must_use]
    pub fn extract_all(&self, record: &Value) -> Vec<Key> {
        let Some(field) = self.resolve(record) else {
            return Vec::new();
        };

        match field {
            Value::Array(items) => {
                let mut keys: Vec<Key> = items.iter().filter_map(Key::from_field).collect();
                keys.sort();
                keys.dedup();
                keys
            }
            _ => Key::from_field(field).into_iter().collect(),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn rank_order_is_number_text_bytes_list() {
        let number = Key::from(5);
        let text = Key::from("a");
        let bytes = Key::Bytes(vec![0]);
        let list = Key::List(vec![Key::from(0)]);

        assert!(number < text);
        assert!(text < bytes);
        assert!(bytes < list);
    }

    #[test]
    fn numbers_order_by_value() {
        assert!(Key::from(1) < Key::from(2));
        assert!(Key::Number(-1.5) < Key::Number(0.0));
        assert_eq!(Key::from(3), Key::Number(3.0));
    }

    #[test]
    fn lists_compare_elementwise() {
        let a = Key::List(vec![Key::from(1), Key::from(2)]);
        let b = Key::List(vec![Key::from(1), Key::from(3)]);
        let prefix = Key::List(vec![Key::from(1)]);

        assert!(a < b);
        assert!(prefix < a);
    }

    #[test]
    fn nan_is_rejected() {
        assert!(Key::number(f64::NAN).is_err());
        assert!(Key::number(2.5).is_ok());
    }

    #[test]
    fn key_path_rejects_malformed_paths() {
        assert!(KeyPath::parse("").is_err());
        assert!(KeyPath::parse("a..b").is_err());
        assert!(KeyPath::parse("a.b").is_ok());
    }

    #[test]
    fn key_path_extracts_nested_fields() {
        let path = KeyPath::parse("meta.owner").unwrap();
        let record = json!({ "meta": { "owner": "ada" }, "id": 1 });

        assert_eq!(path.extract(&record), Some(Key::from("ada")));
        assert_eq!(path.extract(&json!({ "meta": {} })), None);
    }

    #[test]
    fn extract_all_expands_arrays() {
        let path = KeyPath::parse("tags").unwrap();
        let record = json!({ "tags": ["b", "a", "b"] });

        assert_eq!(
            path.extract_all(&record),
            vec![Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn extract_all_falls_back_to_single_key() {
        let path = KeyPath::parse("id").unwrap();

        assert_eq!(path.extract_all(&json!({ "id": 7 })), vec![Key::from(7)]);
        assert!(path.extract_all(&json!({ "id": true })).is_empty());
    }

    #[test]
    fn vacant_ranges_are_detected() {
        let inverted = KeyRange::new(
            Bound::Included(Key::from(9)),
            Bound::Included(Key::from(1)),
        );
        let pinched = KeyRange::new(
            Bound::Excluded(Key::from(5)),
            Bound::Included(Key::from(5)),
        );

        assert!(inverted.is_vacant());
        assert!(pinched.is_vacant());
        assert!(!KeyRange::only(Key::from(5)).is_vacant());
        assert!(!KeyRange::unbounded().is_vacant());
    }

    #[test]
    fn range_containment_respects_bounds() {
        let range = KeyRange::new(
            Bound::Included(Key::from(2)),
            Bound::Excluded(Key::from(5)),
        );

        assert!(!range.contains(&Key::from(1)));
        assert!(range.contains(&Key::from(2)));
        assert!(range.contains(&Key::from(4)));
        assert!(!range.contains(&Key::from(5)));
    }

    fn key_strategy() -> impl Strategy<Value = Key> {
        let leaf = prop_oneof![
            (-1.0e9f64..1.0e9).prop_map(Key::Number),
            "[a-z]{0,8}".prop_map(Key::Text),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Key::Bytes),
        ];
        leaf.prop_recursive(2, 16, 4, |inner| {
            proptest::collection::vec(inner, 0..4).prop_map(Key::List)
        })
    }

    proptest! {
        #[test]
        fn ordering_is_total_and_rank_consistent(a in key_strategy(), b in key_strategy()) {
            // Antisymmetry of the comparator.
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());

            // Cross-rank comparisons always follow canonical rank.
            if a.canonical_rank() != b.canonical_rank() {
                prop_assert_eq!(a.cmp(&b), a.canonical_rank().cmp(&b.canonical_rank()));
            }
        }
    }
}

use crate::key::Key;
use serde_json::Value;

///
/// FetchResult
///
/// What a fetch settles with. Direct lookups settle with at most one
/// record; range and cursor access settles with an ordered sequence.
///

#[derive(Clone, Debug, PartialEq)]
pub enum FetchResult {
    One(Option<Value>),
    Many(Vec<Value>),
}

impl FetchResult {
    /// The single record, if this was a direct lookup that found one.
    #[must_use]
    pub fn into_record(self) -> Option<Value> {
        match self {
            Self::One(record) => record,
            Self::Many(mut records) => {
                if records.is_empty() {
                    None
                } else {
                    Some(records.swap_remove(0))
                }
            }
        }
    }

    /// Every record, in traversal order.
    #[must_use]
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::One(record) => record.into_iter().collect(),
            Self::Many(records) => records,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(record) => usize::from(record.is_some()),
            Self::Many(records) => records.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

///
/// UpsertOutcome
///
/// Confirmation keys for the records an upsert wrote, in write order. A
/// direct write confirms one key; a cursor update confirms one per
/// replaced record.
///

#[derive(Clone, Debug, PartialEq)]
pub struct UpsertOutcome {
    pub keys: Vec<Key>,
}

impl UpsertOutcome {
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.keys.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_and_many_collapse_consistently() {
        let one = FetchResult::One(Some(json!({"id": 1})));
        assert_eq!(one.len(), 1);
        assert_eq!(one.into_record(), Some(json!({"id": 1})));

        let none = FetchResult::One(None);
        assert!(none.is_empty());
        assert_eq!(none.into_records(), Vec::<Value>::new());

        let many = FetchResult::Many(vec![json!(1), json!(2)]);
        assert_eq!(many.clone().into_record(), Some(json!(1)));
        assert_eq!(many.into_records().len(), 2);
    }
}

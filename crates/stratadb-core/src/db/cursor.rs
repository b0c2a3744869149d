//! Cursor-driven iteration and accumulation.
//!
//! Walks drive an advance-on-demand engine cursor through an explicit loop,
//! applying the caller predicate per positioned entry. A failure on any
//! sub-request aborts the walk; accumulated partial results are discarded
//! by propagating the failure.

use crate::{
    db::resolve::WalkPlan,
    engine::{CollectionHandle, EntryCursor},
    error::Error,
    key::Key,
};
use serde_json::Value;

///
/// Accumulator
///
/// Ordered result accumulation with optional truncation. The driving loop
/// checks `is_full` after each push; the accumulator never drops items it
/// has accepted.
///

pub(crate) struct Accumulator<T> {
    items: Vec<T>,
    limit: Option<usize>,
}

impl<T> Accumulator<T> {
    pub(crate) const fn new(limit: Option<usize>) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.items.len() >= limit)
    }

    pub(crate) fn finish(self) -> Vec<T> {
        self.items
    }
}

///
/// WalkStats
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct WalkStats {
    pub visited: u64,
    pub emitted: u64,
}

/// Open the entry cursor a walk plan calls for: over the collection
/// itself, or over the named index when the plan addresses one.
pub(crate) fn open_walk_cursor(
    handle: &dyn CollectionHandle,
    plan: &WalkPlan<'_>,
) -> Result<Box<dyn EntryCursor>, Error> {
    let cursor = match &plan.index {
        Some(index) => handle.index(index)?.open_cursor(&plan.range, plan.direction)?,
        None => handle.open_cursor(&plan.range, plan.direction)?,
    };
    Ok(cursor)
}

/// Fetch walk: append the predicate's returned value for every entry it
/// accepts, in traversal order.
pub(crate) fn walk_map(
    cursor: &mut dyn EntryCursor,
    map: &dyn Fn(&Value) -> Option<Value>,
    count: Option<usize>,
) -> Result<(Vec<Value>, WalkStats), Error> {
    let mut acc = Accumulator::new(count);
    let mut stats = WalkStats::default();

    // Checked before each advance so a zero limit emits nothing, matching
    // range-read truncation.
    while !acc.is_full() {
        let Some(entry) = cursor.advance()? else {
            break;
        };
        stats.visited += 1;
        if let Some(value) = map(&entry.record) {
            acc.push(value);
            stats.emitted += 1;
        }
    }

    Ok((acc.finish(), stats))
}

/// Upsert walk: replace each entry for which the predicate returns a
/// non-empty object, reporting confirmation keys in traversal order.
pub(crate) fn walk_patch(
    handle: &dyn CollectionHandle,
    cursor: &mut dyn EntryCursor,
    patch: &dyn Fn(&Value) -> Option<Value>,
    count: Option<usize>,
) -> Result<(Vec<Key>, WalkStats), Error> {
    let mut acc = Accumulator::new(count);
    let mut stats = WalkStats::default();

    while !acc.is_full() {
        let Some(entry) = cursor.advance()? else {
            break;
        };
        stats.visited += 1;

        let replacement = match patch(&entry.record) {
            Some(Value::Object(fields)) if !fields.is_empty() => Value::Object(fields),
            _ => continue,
        };

        // Update in place: the replacement lands at the entry's position.
        let key = handle.put(Some(entry.primary_key), &replacement)?;
        acc.push(key);
        stats.emitted += 1;
    }

    Ok((acc.finish(), stats))
}

/// Remove walk: delete each entry for which the predicate returns `true`.
/// Reports nothing beyond the walk statistics.
pub(crate) fn walk_retain(
    handle: &dyn CollectionHandle,
    cursor: &mut dyn EntryCursor,
    retain: &dyn Fn(&Value) -> bool,
) -> Result<WalkStats, Error> {
    let mut stats = WalkStats::default();

    while let Some(entry) = cursor.advance()? {
        stats.visited += 1;
        if retain(&entry.record) {
            handle.delete(&entry.primary_key)?;
            stats.emitted += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_reports_full_at_limit() {
        let mut acc = Accumulator::new(Some(2));
        assert!(!acc.is_full());

        acc.push(1);
        acc.push(2);
        assert!(acc.is_full());
        assert_eq!(acc.finish(), vec![1, 2]);
    }

    #[test]
    fn zero_limit_accumulator_starts_full() {
        let acc = Accumulator::<i32>::new(Some(0));
        assert!(acc.is_full());
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn unlimited_accumulator_never_fills() {
        let mut acc = Accumulator::new(None);
        for i in 0..100 {
            acc.push(i);
        }
        assert!(!acc.is_full());
        assert_eq!(acc.finish().len(), 100);
    }
}

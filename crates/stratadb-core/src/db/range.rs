//! Bound-descriptor to key-range translation.
//!
//! Pure translation layer: no store access, no direction or count policy.

use crate::key::{Key, KeyRange};
use std::ops::Bound;

///
/// Bounds
///
/// Caller-facing range descriptor. At most one of `{start|end}` or `only`
/// is meaningful at a time; `only` takes precedence if both forms are
/// supplied.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub start: Option<Key>,
    pub end: Option<Key>,
    pub only: Option<Key>,
}

impl Bounds {
    /// Descriptor matching every key.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            start: None,
            end: None,
            only: None,
        }
    }

    /// Exact-match singleton descriptor.
    #[must_use]
    pub fn only(key: impl Into<Key>) -> Self {
        Self {
            start: None,
            end: None,
            only: Some(key.into()),
        }
    }

    /// Open-ended lower bound (inclusive).
    #[must_use]
    pub fn from(start: impl Into<Key>) -> Self {
        Self {
            start: Some(start.into()),
            end: None,
            only: None,
        }
    }

    /// Open-ended upper bound (inclusive).
    #[must_use]
    pub fn until(end: impl Into<Key>) -> Self {
        Self {
            start: None,
            end: Some(end.into()),
            only: None,
        }
    }

    /// Closed interval descriptor (both ends inclusive).
    #[must_use]
    pub fn between(start: impl Into<Key>, end: impl Into<Key>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            only: None,
        }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.only.is_none()
    }
}

/// Translate a bound descriptor into a key range.
///
/// `only` wins over `start`/`end` when combined; valid callers are not
/// expected to combine them, but the precedence is fixed regardless.
#[must_use]
pub fn build_range(bounds: &Bounds) -> KeyRange {
    if let Some(only) = &bounds.only {
        return KeyRange::only(only.clone());
    }

    let start = bounds
        .start
        .clone()
        .map_or(Bound::Unbounded, Bound::Included);
    let end = bounds.end.clone().map_or(Bound::Unbounded, Bound::Included);

    KeyRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absent_descriptor_matches_everything() {
        let range = build_range(&Bounds::none());
        assert_eq!(range, KeyRange::unbounded());
    }

    #[test]
    fn single_sided_descriptors_stay_open_ended() {
        let lower = build_range(&Bounds::from(3));
        assert_eq!(lower.start, Bound::Included(Key::from(3)));
        assert_eq!(lower.end, Bound::Unbounded);

        let upper = build_range(&Bounds::until(9));
        assert_eq!(upper.start, Bound::Unbounded);
        assert_eq!(upper.end, Bound::Included(Key::from(9)));
    }

    #[test]
    fn closed_interval_is_inclusive_on_both_ends() {
        let range = build_range(&Bounds::between(2, 8));
        assert!(range.contains(&Key::from(2)));
        assert!(range.contains(&Key::from(8)));
        assert!(!range.contains(&Key::from(9)));
    }

    #[test]
    fn only_wins_over_start_and_end() {
        let mut combined = Bounds::between(1, 9);
        combined.only = Some(Key::from(5));

        assert_eq!(build_range(&combined), build_range(&Bounds::only(5)));
    }

    proptest! {
        #[test]
        fn only_precedence_holds_for_any_interval(
            only in -100i64..100,
            start in -100i64..100,
            end in -100i64..100,
        ) {
            let mut combined = Bounds::between(start, end);
            combined.only = Some(Key::from(only));

            prop_assert_eq!(build_range(&combined), KeyRange::only(Key::from(only)));
        }
    }
}

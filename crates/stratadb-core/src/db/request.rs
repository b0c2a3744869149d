use crate::{db::range::Bounds, engine::Direction, key::Key};
use serde_json::Value;
use std::fmt;

///
/// Predicate
///
/// Caller-supplied per-entry function for cursor walks. Each call kind
/// accepts exactly one variant; supplying another is a contract violation
/// reported before the walk starts.
///

#[derive(Clone, Copy)]
pub enum Predicate<'a> {
    /// Fetch: entries whose mapped value is `Some` are appended to the
    /// result sequence, in traversal order.
    Map(&'a dyn Fn(&Value) -> Option<Value>),

    /// Upsert: a returned non-empty object replaces the record in place;
    /// the confirmation key is appended to the result sequence.
    Patch(&'a dyn Fn(&Value) -> Option<Value>),

    /// Remove: entries for which this returns `true` are deleted in place.
    Retain(&'a dyn Fn(&Value) -> bool),
}

impl Predicate<'_> {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Map(_) => "map",
            Self::Patch(_) => "patch",
            Self::Retain(_) => "retain",
        }
    }
}

impl fmt::Debug for Predicate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate::{}", self.kind())
    }
}

///
/// Request
///
/// The options record for one fetch/upsert/remove call. Field presence and
/// absence together select exactly one resolved operation; the record is
/// created fresh per call and consumed synchronously by the resolver.
///

#[derive(Debug, Default)]
pub struct Request<'a> {
    pub(crate) key: Option<Key>,
    pub(crate) value: Option<Value>,
    pub(crate) index: Option<String>,
    pub(crate) predicate: Option<Predicate<'a>>,
    pub(crate) query: Bounds,
    pub(crate) count: Option<usize>,
    pub(crate) direction: Direction,
}

impl<'a> Request<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Address the named secondary index instead of the collection itself.
    #[must_use]
    pub fn index(mut self, name: &str) -> Self {
        self.index = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn query(mut self, bounds: Bounds) -> Self {
        self.query = bounds;
        self
    }

    #[must_use]
    pub const fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub const fn predicate(mut self, predicate: Predicate<'a>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Shorthand for a fetch cursor predicate.
    #[must_use]
    pub const fn select(self, f: &'a dyn Fn(&Value) -> Option<Value>) -> Self {
        self.predicate(Predicate::Map(f))
    }

    /// Shorthand for an upsert cursor predicate.
    #[must_use]
    pub const fn patch(self, f: &'a dyn Fn(&Value) -> Option<Value>) -> Self {
        self.predicate(Predicate::Patch(f))
    }

    /// Shorthand for a remove cursor predicate.
    #[must_use]
    pub const fn matching(self, f: &'a dyn Fn(&Value) -> bool) -> Self {
        self.predicate(Predicate::Retain(f))
    }
}

//! Storage engine port.
//!
//! The core does not implement the underlying ordered key-value engine; it
//! consumes one through these capabilities. An engine handle is injected
//! into the database explicitly; there is no process-wide singleton.
//!
//! Contract: every request settles exactly once with a value or an error,
//! and a scope finalizes exactly once (commit or abort).

pub mod memory;

use crate::{
    error::{Error, ErrorClass, ErrorOrigin},
    key::{Key, KeyRange},
    schema::CollectionModel,
};
use derive_more::Deref;
use serde_json::Value;
use thiserror::Error as ThisError;

pub use memory::MemoryEngine;

///
/// EngineError
///

#[derive(Clone, Debug, ThisError)]
pub enum EngineError {
    #[error("unknown collection: {name:?}")]
    CollectionNotFound { name: String },

    #[error("unknown index: {collection:?}.{index:?}")]
    IndexNotFound { collection: String, index: String },

    #[error("key already exists: {key}")]
    KeyExists { key: Key },

    #[error("unique index violation: {index:?} value {value}")]
    UniqueViolation { index: String, value: Key },

    #[error("explicit key {explicit} disagrees with derived key {derived}")]
    KeyMismatch { explicit: Key, derived: Key },

    #[error("record has no explicit, derived, or generated key")]
    MissingKey,

    #[error("row exceeds max size: {len} bytes (limit {MAX_ROW_BYTES})")]
    RowTooLarge { len: usize },

    #[error("store corruption: {message}")]
    Corrupt { message: String },

    #[error("a scope is already open against this engine")]
    ScopeActive,

    #[error("database name mismatch: open as {open:?}, configured as {configured:?}")]
    NameMismatch { open: String, configured: String },

    #[error("version regression: {from} -> {to}")]
    VersionRegression { from: u32, to: u32 },
}

impl EngineError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::CollectionNotFound { .. }
            | Self::MissingKey
            | Self::NameMismatch { .. }
            | Self::VersionRegression { .. } => ErrorClass::ContractViolation,
            Self::KeyExists { .. } | Self::UniqueViolation { .. } | Self::ScopeActive => {
                ErrorClass::Conflict
            }
            Self::IndexNotFound { .. }
            | Self::KeyMismatch { .. }
            | Self::RowTooLarge { .. }
            | Self::Corrupt { .. } => ErrorClass::Engine,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::new(err.class(), ErrorOrigin::Engine, err.to_string())
    }
}

///
/// RawRow
///
/// Serialized record bytes as held by the engine. Bounded so single-row
/// loads stay within a known size.
///

/// Max serialized bytes for a single row.
pub const MAX_ROW_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone, Debug, Deref, Eq, PartialEq)]
pub struct RawRow(Vec<u8>);

impl RawRow {
    pub fn try_new(bytes: Vec<u8>) -> Result<Self, EngineError> {
        if bytes.len() > MAX_ROW_BYTES {
            return Err(EngineError::RowTooLarge { len: bytes.len() });
        }
        Ok(Self(bytes))
    }

    pub fn try_decode(&self) -> Result<Value, EngineError> {
        crate::serialize::deserialize(&self.0).map_err(|err| EngineError::Corrupt {
            message: err.to_string(),
        })
    }
}

///
/// Direction
///
/// Canonical traversal direction shared by requests, cursor walks, and
/// engine range iteration. Unique variants skip duplicate index keys.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    ForwardUnique,
    ReverseUnique,
}

impl Direction {
    #[must_use]
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse | Self::ReverseUnique)
    }

    #[must_use]
    pub const fn is_unique(self) -> bool {
        matches!(self, Self::ForwardUnique | Self::ReverseUnique)
    }
}

///
/// Entry
///
/// One positioned cursor entry. For collection cursors `key` equals
/// `primary_key`; for index cursors `key` is the indexed value.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub primary_key: Key,
    pub record: Value,
}

///
/// EntryCursor
///
/// Advance-on-demand iterator over a bounded, directional entry sequence.
/// Each advance is an independent engine request; mutating the underlying
/// collection between advances is allowed and the cursor observes it.
///

pub trait EntryCursor {
    fn advance(&mut self) -> Result<Option<Entry>, EngineError>;
}

///
/// IndexHandle
///

pub trait IndexHandle {
    /// Single lookup: the record of the first entry in key order whose
    /// indexed value equals `key`.
    fn get(&self, key: &Key) -> Result<Option<Value>, EngineError>;

    /// Ordered records for every entry in `range`, truncated to `count`.
    fn get_all(&self, range: &KeyRange, count: Option<usize>) -> Result<Vec<Value>, EngineError>;

    fn open_cursor(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn EntryCursor>, EngineError>;
}

///
/// CollectionHandle
///
/// Raw per-collection request surface issued by an open scope.
///

pub trait CollectionHandle {
    fn model(&self) -> &CollectionModel;

    fn get(&self, key: &Key) -> Result<Option<Value>, EngineError>;

    fn get_range(&self, range: &KeyRange, count: Option<usize>) -> Result<Vec<Value>, EngineError>;

    /// Write a record, replacing any existing record at the same key.
    ///
    /// The key is the explicit `key` if given, otherwise derived from the
    /// collection key path, otherwise generated when the collection
    /// auto-increments. An explicit key that disagrees with a derived key
    /// is rejected.
    fn put(&self, key: Option<Key>, record: &Value) -> Result<Key, EngineError>;

    /// Write a record, failing if the key already exists.
    fn add(&self, key: Option<Key>, record: &Value) -> Result<Key, EngineError>;

    /// Delete the record at `key`. Deleting an absent key is a no-op.
    fn delete(&self, key: &Key) -> Result<(), EngineError>;

    /// Delete every record in the collection.
    fn clear(&self) -> Result<(), EngineError>;

    fn open_cursor(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn EntryCursor>, EngineError>;

    fn index(&self, name: &str) -> Result<Box<dyn IndexHandle>, EngineError>;
}

///
/// EngineScope
///
/// One atomic unit over a set of collections. Emits exactly one of
/// commit or abort; dropping an unfinalized scope aborts it.
///

pub trait EngineScope {
    fn collection_names(&self) -> Vec<String>;

    fn collection(&self, name: &str) -> Result<Box<dyn CollectionHandle>, EngineError>;

    fn commit(self: Box<Self>) -> Result<(), EngineError>;

    fn abort(self: Box<Self>);
}

///
/// StorageEngine
///
/// Injected engine capability: enumerable collections plus scope opening.
///

pub trait StorageEngine {
    fn collection_names(&self) -> Vec<String>;

    fn begin(&self, collections: &[String]) -> Result<Box<dyn EngineScope>, EngineError>;
}

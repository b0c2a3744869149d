//! Reference in-memory engine.
//!
//! Single-threaded, ordered-map backed, with a rollback journal so a scope
//! abort restores the pre-scope state exactly. Exists to exercise the core;
//! durability is out of scope.

use crate::{
    engine::{
        CollectionHandle, Direction, EngineError, EngineScope, Entry, EntryCursor, IndexHandle,
        RawRow, StorageEngine,
    },
    key::{Key, KeyRange},
    schema::{CollectionModel, DatabaseConfig, IndexModel},
    serialize,
};
use serde_json::Value;
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    ops::Bound,
    rc::Rc,
};

///
/// IndexEntryKey
///
/// Composite index entry ordered by indexed value, then primary key, so
/// non-unique lookups tie-break deterministically in primary-key order.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct IndexEntryKey {
    value: Key,
    primary: Key,
}

///
/// IndexState
///

struct IndexState {
    model: IndexModel,
    entries: BTreeSet<IndexEntryKey>,
}

impl IndexState {
    /// Entries a record contributes under this index's key path.
    fn entries_for(model: &IndexModel, primary: &Key, record: &Value) -> Vec<IndexEntryKey> {
        let values = if model.multi_entry {
            model.key_path.extract_all(record)
        } else {
            model.key_path.extract(record).into_iter().collect()
        };

        values
            .into_iter()
            .map(|value| IndexEntryKey {
                value,
                primary: primary.clone(),
            })
            .collect()
    }
}

///
/// CollectionState
///

struct CollectionState {
    model: CollectionModel,
    rows: BTreeMap<Key, RawRow>,
    indexes: BTreeMap<String, IndexState>,
    next_auto: i64,
}

impl CollectionState {
    fn from_model(model: &CollectionModel) -> Self {
        let indexes = model
            .indexes
            .iter()
            .map(|index| {
                (
                    index.name.clone(),
                    IndexState {
                        model: index.clone(),
                        entries: BTreeSet::new(),
                    },
                )
            })
            .collect();

        Self {
            model: model.clone(),
            rows: BTreeMap::new(),
            indexes,
            next_auto: 1,
        }
    }

    /// Every index entry currently contributed by the row at `primary`.
    fn entries_for_row(&self, primary: &Key, record: &Value) -> Vec<(String, IndexEntryKey)> {
        let mut out = Vec::new();
        for (name, index) in &self.indexes {
            for entry in IndexState::entries_for(&index.model, primary, record) {
                out.push((name.clone(), entry));
            }
        }
        out
    }
}

///
/// EngineState
///

struct EngineState {
    name: String,
    version: u32,
    collections: BTreeMap<String, CollectionState>,
    scope_active: bool,
}

///
/// UndoOp
///
/// One journal entry capturing prior state; rollback applies the journal
/// in reverse write order.
///

enum UndoOp {
    Row {
        collection: String,
        key: Key,
        prior: Option<RawRow>,
    },
    IndexEntry {
        collection: String,
        index: String,
        entry: IndexEntryKey,
        present: bool,
    },
    Auto {
        collection: String,
        prior: i64,
    },
    Snapshot {
        collection: String,
        rows: BTreeMap<Key, RawRow>,
        entries: BTreeMap<String, BTreeSet<IndexEntryKey>>,
    },
}

type Journal = Rc<RefCell<Vec<UndoOp>>>;
type SharedState = Rc<RefCell<EngineState>>;

fn rollback(state: &SharedState, journal: &Journal) {
    let mut state = state.borrow_mut();
    for op in journal.borrow_mut().drain(..).rev() {
        match op {
            UndoOp::Row {
                collection,
                key,
                prior,
            } => {
                if let Some(coll) = state.collections.get_mut(&collection) {
                    match prior {
                        Some(row) => coll.rows.insert(key, row),
                        None => coll.rows.remove(&key),
                    };
                }
            }
            UndoOp::IndexEntry {
                collection,
                index,
                entry,
                present,
            } => {
                if let Some(index) = state
                    .collections
                    .get_mut(&collection)
                    .and_then(|coll| coll.indexes.get_mut(&index))
                {
                    if present {
                        index.entries.insert(entry);
                    } else {
                        index.entries.remove(&entry);
                    }
                }
            }
            UndoOp::Auto { collection, prior } => {
                if let Some(coll) = state.collections.get_mut(&collection) {
                    coll.next_auto = prior;
                }
            }
            UndoOp::Snapshot {
                collection,
                rows,
                entries,
            } => {
                if let Some(coll) = state.collections.get_mut(&collection) {
                    coll.rows = rows;
                    for (name, set) in entries {
                        if let Some(index) = coll.indexes.get_mut(&name) {
                            index.entries = set;
                        }
                    }
                }
            }
        }
    }
}

///
/// MemoryEngine
///

pub struct MemoryEngine {
    state: SharedState,
}

impl MemoryEngine {
    /// Open a fresh engine holding the configured collections.
    #[must_use]
    pub fn open(config: &DatabaseConfig) -> Self {
        let collections = config
            .collections
            .iter()
            .map(|model| (model.name.clone(), CollectionState::from_model(model)))
            .collect();

        Self {
            state: Rc::new(RefCell::new(EngineState {
                name: config.name.clone(),
                version: config.version,
                collections,
                scope_active: false,
            })),
        }
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.borrow().version
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// Diff the open database against `config` and apply the schema delta.
    ///
    /// Collections and indexes present in `config` but not in the engine are
    /// created (new indexes are rebuilt from existing rows); those absent
    /// from `config` are dropped. Rows of kept collections survive. The
    /// configured version must advance, and no scope may be open.
    pub fn migrate(&self, config: &DatabaseConfig) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();

        if state.scope_active {
            return Err(EngineError::ScopeActive);
        }
        if config.name != state.name {
            return Err(EngineError::NameMismatch {
                open: state.name.clone(),
                configured: config.name.clone(),
            });
        }
        if config.version <= state.version {
            return Err(EngineError::VersionRegression {
                from: state.version,
                to: config.version,
            });
        }

        // Drop collections the new schema no longer names.
        let keep = config.collection_names();
        state.collections.retain(|name, _| keep.contains(name));

        for model in &config.collections {
            match state.collections.get_mut(&model.name) {
                None => {
                    state
                        .collections
                        .insert(model.name.clone(), CollectionState::from_model(model));
                }
                Some(coll) => {
                    let wanted: BTreeSet<String> =
                        model.indexes.iter().map(|i| i.name.clone()).collect();
                    coll.indexes.retain(|name, _| wanted.contains(name));

                    for index_model in &model.indexes {
                        if !coll.indexes.contains_key(&index_model.name) {
                            let entries = rebuild_index(coll, index_model)?;
                            coll.indexes.insert(
                                index_model.name.clone(),
                                IndexState {
                                    model: index_model.clone(),
                                    entries,
                                },
                            );
                        }
                    }
                    coll.model = model.clone();
                }
            }
        }

        state.version = config.version;
        Ok(())
    }
}

/// Build the full entry set for a new index from existing rows.
///
/// The set is assembled before any mutation so a uniqueness failure leaves
/// the engine unchanged.
fn rebuild_index(
    coll: &CollectionState,
    model: &IndexModel,
) -> Result<BTreeSet<IndexEntryKey>, EngineError> {
    let mut entries = BTreeSet::new();
    for (primary, row) in &coll.rows {
        let record = row.try_decode()?;
        for entry in IndexState::entries_for(model, primary, &record) {
            if model.unique
                && entries
                    .iter()
                    .any(|existing: &IndexEntryKey| existing.value == entry.value)
            {
                return Err(EngineError::UniqueViolation {
                    index: model.name.clone(),
                    value: entry.value,
                });
            }
            entries.insert(entry);
        }
    }
    Ok(entries)
}

impl StorageEngine for MemoryEngine {
    fn collection_names(&self) -> Vec<String> {
        self.state.borrow().collections.keys().cloned().collect()
    }

    fn begin(&self, collections: &[String]) -> Result<Box<dyn EngineScope>, EngineError> {
        let mut state = self.state.borrow_mut();

        if state.scope_active {
            return Err(EngineError::ScopeActive);
        }
        for name in collections {
            if !state.collections.contains_key(name) {
                return Err(EngineError::CollectionNotFound { name: name.clone() });
            }
        }

        state.scope_active = true;
        drop(state);

        Ok(Box::new(MemoryScope {
            state: Rc::clone(&self.state),
            journal: Rc::new(RefCell::new(Vec::new())),
            names: collections.to_vec(),
            finalized: false,
        }))
    }
}

///
/// MemoryScope
///

struct MemoryScope {
    state: SharedState,
    journal: Journal,
    names: Vec<String>,
    finalized: bool,
}

impl MemoryScope {
    fn finalize(&mut self, commit: bool) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if commit {
            self.journal.borrow_mut().clear();
        } else {
            rollback(&self.state, &self.journal);
        }
        self.state.borrow_mut().scope_active = false;
    }
}

impl EngineScope for MemoryScope {
    fn collection_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn collection(&self, name: &str) -> Result<Box<dyn CollectionHandle>, EngineError> {
        if !self.names.iter().any(|n| n == name) {
            return Err(EngineError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        let model = self
            .state
            .borrow()
            .collections
            .get(name)
            .map(|coll| coll.model.clone())
            .ok_or_else(|| EngineError::CollectionNotFound {
                name: name.to_string(),
            })?;

        Ok(Box::new(MemoryCollectionHandle {
            state: Rc::clone(&self.state),
            journal: Rc::clone(&self.journal),
            name: name.to_string(),
            model,
        }))
    }

    fn commit(mut self: Box<Self>) -> Result<(), EngineError> {
        self.finalize(true);
        Ok(())
    }

    fn abort(mut self: Box<Self>) {
        self.finalize(false);
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        // An unfinalized scope aborts.
        self.finalize(false);
    }
}

///
/// MemoryCollectionHandle
///

struct MemoryCollectionHandle {
    state: SharedState,
    journal: Journal,
    name: String,
    model: CollectionModel,
}

impl MemoryCollectionHandle {
    fn with_collection<R>(
        &self,
        f: impl FnOnce(&mut CollectionState, &mut Vec<UndoOp>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut state = self.state.borrow_mut();
        let coll = state
            .collections
            .get_mut(&self.name)
            .ok_or_else(|| EngineError::CollectionNotFound {
                name: self.name.clone(),
            })?;
        f(coll, &mut self.journal.borrow_mut())
    }

    /// Resolve the primary key for a write per the precedence rules:
    /// explicit, then derived from the key path, then auto-increment.
    fn resolve_key(
        coll: &CollectionState,
        explicit: Option<Key>,
        record: &Value,
    ) -> Result<Key, EngineError> {
        let derived = coll
            .model
            .key_path
            .as_ref()
            .and_then(|path| path.extract(record));

        match (explicit, derived) {
            (Some(explicit), Some(derived)) => {
                if explicit == derived {
                    Ok(explicit)
                } else {
                    Err(EngineError::KeyMismatch { explicit, derived })
                }
            }
            (Some(explicit), None) => Ok(explicit),
            (None, Some(derived)) => Ok(derived),
            (None, None) if coll.model.auto_increment => {
                #[allow(clippy::cast_precision_loss)]
                let next = coll.next_auto as f64;
                Ok(Key::Number(next))
            }
            (None, None) => Err(EngineError::MissingKey),
        }
    }

    fn write(&self, explicit: Option<Key>, record: &Value, fail_if_present: bool)
        -> Result<Key, EngineError>
    {
        self.with_collection(|coll, journal| {
            // Prepare phase: no mutation until every check has passed.
            let row = RawRow::try_new(serialize::serialize(record).map_err(|err| {
                EngineError::Corrupt {
                    message: err.to_string(),
                }
            })?)?;
            let key = Self::resolve_key(coll, explicit, record)?;

            let prior = coll.rows.get(&key).cloned();
            if fail_if_present && prior.is_some() {
                return Err(EngineError::KeyExists { key });
            }

            let new_entries = coll.entries_for_row(&key, record);
            for (name, entry) in &new_entries {
                let index = &coll.indexes[name];
                if index.model.unique {
                    let conflict = index
                        .entries
                        .iter()
                        .any(|existing| existing.value == entry.value && existing.primary != key);
                    if conflict {
                        return Err(EngineError::UniqueViolation {
                            index: name.clone(),
                            value: entry.value.clone(),
                        });
                    }
                }
            }

            // Apply phase.
            if coll.model.auto_increment {
                if let Key::Number(n) = &key {
                    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                    if n.is_finite() && *n >= coll.next_auto as f64 {
                        journal.push(UndoOp::Auto {
                            collection: self.name.clone(),
                            prior: coll.next_auto,
                        });
                        coll.next_auto = (n.floor() as i64).saturating_add(1);
                    }
                }
            }

            if let Some(prior_row) = &prior {
                let prior_record = prior_row.try_decode()?;
                for (name, entry) in coll.entries_for_row(&key, &prior_record) {
                    if let Some(index) = coll.indexes.get_mut(&name) {
                        if index.entries.remove(&entry) {
                            journal.push(UndoOp::IndexEntry {
                                collection: self.name.clone(),
                                index: name,
                                entry,
                                present: true,
                            });
                        }
                    }
                }
            }

            journal.push(UndoOp::Row {
                collection: self.name.clone(),
                key: key.clone(),
                prior,
            });
            coll.rows.insert(key.clone(), row);

            for (name, entry) in new_entries {
                if let Some(index) = coll.indexes.get_mut(&name) {
                    if index.entries.insert(entry.clone()) {
                        journal.push(UndoOp::IndexEntry {
                            collection: self.name.clone(),
                            index: name,
                            entry,
                            present: false,
                        });
                    }
                }
            }

            Ok(key)
        })
    }
}

impl CollectionHandle for MemoryCollectionHandle {
    fn model(&self) -> &CollectionModel {
        &self.model
    }

    fn get(&self, key: &Key) -> Result<Option<Value>, EngineError> {
        self.with_collection(|coll, _| {
            coll.rows.get(key).map(RawRow::try_decode).transpose()
        })
    }

    fn get_range(&self, range: &KeyRange, count: Option<usize>) -> Result<Vec<Value>, EngineError> {
        self.with_collection(|coll, _| {
            if range.is_vacant() {
                return Ok(Vec::new());
            }

            let limit = count.unwrap_or(usize::MAX);
            let mut out = Vec::new();
            for (_, row) in coll.rows.range(range.as_bounds()) {
                if out.len() >= limit {
                    break;
                }
                out.push(row.try_decode()?);
            }
            Ok(out)
        })
    }

    fn put(&self, key: Option<Key>, record: &Value) -> Result<Key, EngineError> {
        self.write(key, record, false)
    }

    fn add(&self, key: Option<Key>, record: &Value) -> Result<Key, EngineError> {
        self.write(key, record, true)
    }

    fn delete(&self, key: &Key) -> Result<(), EngineError> {
        self.with_collection(|coll, journal| {
            let Some(prior) = coll.rows.get(key).cloned() else {
                return Ok(());
            };

            let record = prior.try_decode()?;
            for (name, entry) in coll.entries_for_row(key, &record) {
                if let Some(index) = coll.indexes.get_mut(&name) {
                    if index.entries.remove(&entry) {
                        journal.push(UndoOp::IndexEntry {
                            collection: self.name.clone(),
                            index: name,
                            entry,
                            present: true,
                        });
                    }
                }
            }

            journal.push(UndoOp::Row {
                collection: self.name.clone(),
                key: key.clone(),
                prior: Some(prior),
            });
            coll.rows.remove(key);
            Ok(())
        })
    }

    fn clear(&self) -> Result<(), EngineError> {
        self.with_collection(|coll, journal| {
            let rows = std::mem::take(&mut coll.rows);
            let mut entries = BTreeMap::new();
            for (name, index) in &mut coll.indexes {
                entries.insert(name.clone(), std::mem::take(&mut index.entries));
            }

            // The key generator survives a clear.
            journal.push(UndoOp::Snapshot {
                collection: self.name.clone(),
                rows,
                entries,
            });
            Ok(())
        })
    }

    fn open_cursor(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn EntryCursor>, EngineError> {
        Ok(Box::new(MemoryRowCursor {
            state: Rc::clone(&self.state),
            collection: self.name.clone(),
            range: range.clone(),
            direction,
            last: None,
        }))
    }

    fn index(&self, name: &str) -> Result<Box<dyn IndexHandle>, EngineError> {
        self.with_collection(|coll, _| {
            if !coll.indexes.contains_key(name) {
                return Err(EngineError::IndexNotFound {
                    collection: self.name.clone(),
                    index: name.to_string(),
                });
            }
            Ok(())
        })?;

        Ok(Box::new(MemoryIndexHandle {
            state: Rc::clone(&self.state),
            collection: self.name.clone(),
            index: name.to_string(),
        }))
    }
}

///
/// MemoryRowCursor
///
/// Re-seeking row cursor: each advance looks up the next key strictly
/// beyond the last visited one, so in-place mutation between advances is
/// observed rather than invalidating the walk.
///

struct MemoryRowCursor {
    state: SharedState,
    collection: String,
    range: KeyRange,
    direction: Direction,
    last: Option<Key>,
}

impl EntryCursor for MemoryRowCursor {
    fn advance(&mut self) -> Result<Option<Entry>, EngineError> {
        let state = self.state.borrow();
        let coll = state.collections.get(&self.collection).ok_or_else(|| {
            EngineError::CollectionNotFound {
                name: self.collection.clone(),
            }
        })?;

        let mut window = self.range.clone();
        if let Some(last) = &self.last {
            if self.direction.is_reverse() {
                window.end = Bound::Excluded(last.clone());
            } else {
                window.start = Bound::Excluded(last.clone());
            }
        }
        if window.is_vacant() {
            return Ok(None);
        }

        let mut iter = coll.rows.range(window.as_bounds());
        let next = if self.direction.is_reverse() {
            iter.next_back()
        } else {
            iter.next()
        };

        let Some((key, row)) = next else {
            return Ok(None);
        };

        let entry = Entry {
            key: key.clone(),
            primary_key: key.clone(),
            record: row.try_decode()?,
        };
        drop(state);

        self.last = Some(entry.key.clone());
        Ok(Some(entry))
    }
}

///
/// MemoryIndexHandle
///

struct MemoryIndexHandle {
    state: SharedState,
    collection: String,
    index: String,
}

impl MemoryIndexHandle {
    fn with_index<R>(
        &self,
        f: impl FnOnce(&CollectionState, &IndexState) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let state = self.state.borrow();
        let coll = state.collections.get(&self.collection).ok_or_else(|| {
            EngineError::CollectionNotFound {
                name: self.collection.clone(),
            }
        })?;
        let index = coll
            .indexes
            .get(&self.index)
            .ok_or_else(|| EngineError::IndexNotFound {
                collection: self.collection.clone(),
                index: self.index.clone(),
            })?;
        f(coll, index)
    }
}

fn record_for_entry(coll: &CollectionState, entry: &IndexEntryKey) -> Result<Value, EngineError> {
    coll.rows
        .get(&entry.primary)
        .ok_or_else(|| EngineError::Corrupt {
            message: format!("index entry points at missing row: {}", entry.primary),
        })?
        .try_decode()
}

impl IndexHandle for MemoryIndexHandle {
    fn get(&self, key: &Key) -> Result<Option<Value>, EngineError> {
        self.with_index(|coll, index| {
            // First match in (value, primary-key) order.
            let entry = index
                .entries
                .iter()
                .find(|entry| entry.value == *key);

            entry.map(|entry| record_for_entry(coll, entry)).transpose()
        })
    }

    fn get_all(&self, range: &KeyRange, count: Option<usize>) -> Result<Vec<Value>, EngineError> {
        self.with_index(|coll, index| {
            let limit = count.unwrap_or(usize::MAX);
            let mut out = Vec::new();
            for entry in index.entries.iter().filter(|e| range.contains(&e.value)) {
                if out.len() >= limit {
                    break;
                }
                out.push(record_for_entry(coll, entry)?);
            }
            Ok(out)
        })
    }

    fn open_cursor(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn EntryCursor>, EngineError> {
        Ok(Box::new(MemoryIndexCursor {
            state: Rc::clone(&self.state),
            collection: self.collection.clone(),
            index: self.index.clone(),
            range: range.clone(),
            direction,
            last: None,
        }))
    }
}

///
/// MemoryIndexCursor
///
/// Re-seeking index cursor with unique-direction support: unique variants
/// yield one entry per distinct indexed value, always the one with the
/// smallest primary key.
///

struct MemoryIndexCursor {
    state: SharedState,
    collection: String,
    index: String,
    range: KeyRange,
    direction: Direction,
    last: Option<IndexEntryKey>,
}

impl EntryCursor for MemoryIndexCursor {
    fn advance(&mut self) -> Result<Option<Entry>, EngineError> {
        let state = self.state.borrow();
        let coll = state.collections.get(&self.collection).ok_or_else(|| {
            EngineError::CollectionNotFound {
                name: self.collection.clone(),
            }
        })?;
        let index = coll
            .indexes
            .get(&self.index)
            .ok_or_else(|| EngineError::IndexNotFound {
                collection: self.collection.clone(),
                index: self.index.clone(),
            })?;

        let in_window = |entry: &&IndexEntryKey| {
            if !self.range.contains(&entry.value) {
                return false;
            }
            match &self.last {
                None => true,
                Some(last) if self.direction.is_unique() => {
                    if self.direction.is_reverse() {
                        entry.value < last.value
                    } else {
                        entry.value > last.value
                    }
                }
                Some(last) => {
                    if self.direction.is_reverse() {
                        **entry < *last
                    } else {
                        **entry > *last
                    }
                }
            }
        };

        let candidate = if self.direction.is_reverse() {
            index.entries.iter().rev().find(in_window)
        } else {
            index.entries.iter().find(in_window)
        };

        let Some(mut chosen) = candidate else {
            return Ok(None);
        };

        // Unique reverse traversal still reports the smallest primary key
        // for the chosen value.
        if self.direction.is_unique() && self.direction.is_reverse() {
            if let Some(first) = index.entries.iter().find(|e| e.value == chosen.value) {
                chosen = first;
            }
        }

        let entry = Entry {
            key: chosen.value.clone(),
            primary_key: chosen.primary.clone(),
            record: record_for_entry(coll, chosen)?,
        };
        let chosen = chosen.clone();
        drop(state);

        self.last = Some(chosen);
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CollectionModel, DatabaseConfig, IndexModel};
    use serde_json::json;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("app", 1)
            .unwrap()
            .collection(
                CollectionModel::new("todos")
                    .unwrap()
                    .key_path("id")
                    .unwrap()
                    .index(IndexModel::new("userId", "userId").unwrap())
                    .unwrap(),
            )
            .unwrap()
            .collection(
                CollectionModel::new("events")
                    .unwrap()
                    .auto_increment(),
            )
            .unwrap()
    }

    fn todo(id: i64, user: i64) -> Value {
        json!({ "id": id, "userId": user })
    }

    #[test]
    fn put_then_get_round_trips() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        let key = todos.put(None, &todo(1, 10)).unwrap();
        assert_eq!(key, Key::from(1));
        assert_eq!(todos.get(&key).unwrap(), Some(todo(1, 10)));

        scope.commit().unwrap();
    }

    #[test]
    fn add_fails_on_existing_key() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        todos.add(None, &todo(1, 10)).unwrap();
        let err = todos.add(None, &todo(1, 11)).unwrap_err();
        assert!(matches!(err, EngineError::KeyExists { .. }));

        // The failed add left the first record untouched.
        assert_eq!(todos.get(&Key::from(1)).unwrap(), Some(todo(1, 10)));
    }

    #[test]
    fn explicit_key_must_agree_with_key_path() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        assert!(matches!(
            todos.put(Some(Key::from(2)), &todo(1, 10)),
            Err(EngineError::KeyMismatch { .. })
        ));
        assert!(todos.put(Some(Key::from(1)), &todo(1, 10)).is_ok());
    }

    #[test]
    fn auto_increment_allocates_and_tracks_explicit_keys() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["events".into()]).unwrap();
        let events = scope.collection("events").unwrap();

        assert_eq!(events.put(None, &json!({"n": 1})).unwrap(), Key::from(1));
        assert_eq!(
            events.put(Some(Key::from(7)), &json!({"n": 2})).unwrap(),
            Key::from(7)
        );
        // The generator resumes past the largest numeric key written.
        assert_eq!(events.put(None, &json!({"n": 3})).unwrap(), Key::from(8));
    }

    #[test]
    fn missing_key_is_rejected_without_auto_increment() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        assert!(matches!(
            todos.put(None, &json!({ "userId": 1 })),
            Err(EngineError::MissingKey)
        ));
    }

    #[test]
    fn unique_index_violation_leaves_store_unchanged() {
        let config = DatabaseConfig::new("app", 1)
            .unwrap()
            .collection(
                CollectionModel::new("users")
                    .unwrap()
                    .key_path("id")
                    .unwrap()
                    .index(IndexModel::new("email", "email").unwrap().unique())
                    .unwrap(),
            )
            .unwrap();
        let engine = MemoryEngine::open(&config);
        let scope = engine.begin(&["users".into()]).unwrap();
        let users = scope.collection("users").unwrap();

        users
            .put(None, &json!({ "id": 1, "email": "a@x" }))
            .unwrap();
        let err = users
            .put(None, &json!({ "id": 2, "email": "a@x" }))
            .unwrap_err();
        assert!(matches!(err, EngineError::UniqueViolation { .. }));

        assert_eq!(users.get(&Key::from(2)).unwrap(), None);
        // Re-putting the same record at the same key stays legal.
        assert!(users.put(None, &json!({ "id": 1, "email": "a@x" })).is_ok());
    }

    #[test]
    fn index_lookup_tie_breaks_in_primary_key_order() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        todos.put(None, &todo(3, 5)).unwrap();
        todos.put(None, &todo(1, 5)).unwrap();
        todos.put(None, &todo(2, 5)).unwrap();

        let index = todos.index("userId").unwrap();
        assert_eq!(index.get(&Key::from(5)).unwrap(), Some(todo(1, 5)));
    }

    #[test]
    fn index_range_returns_index_order() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();

        for (id, user) in [(1, 30), (2, 10), (3, 20)] {
            todos.put(None, &todo(id, user)).unwrap();
        }

        let index = todos.index("userId").unwrap();
        let all = index.get_all(&KeyRange::unbounded(), None).unwrap();
        assert_eq!(all, vec![todo(2, 10), todo(3, 20), todo(1, 30)]);

        let limited = index.get_all(&KeyRange::unbounded(), Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn multi_entry_index_expands_arrays() {
        let config = DatabaseConfig::new("app", 1)
            .unwrap()
            .collection(
                CollectionModel::new("posts")
                    .unwrap()
                    .key_path("id")
                    .unwrap()
                    .index(IndexModel::new("tags", "tags").unwrap().multi_entry())
                    .unwrap(),
            )
            .unwrap();
        let engine = MemoryEngine::open(&config);
        let scope = engine.begin(&["posts".into()]).unwrap();
        let posts = scope.collection("posts").unwrap();

        posts
            .put(None, &json!({ "id": 1, "tags": ["a", "b"] }))
            .unwrap();

        let index = posts.index("tags").unwrap();
        assert!(index.get(&Key::from("a")).unwrap().is_some());
        assert!(index.get(&Key::from("b")).unwrap().is_some());
        assert!(index.get(&Key::from("c")).unwrap().is_none());
    }

    #[test]
    fn abort_rolls_back_every_mutation() {
        let engine = MemoryEngine::open(&config());

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        todos.put(None, &todo(1, 10)).unwrap();
        scope.commit().unwrap();

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        todos.put(None, &todo(1, 99)).unwrap();
        todos.put(None, &todo(2, 20)).unwrap();
        todos.delete(&Key::from(1)).unwrap();
        todos.clear().unwrap();
        scope.abort();

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        assert_eq!(todos.get(&Key::from(1)).unwrap(), Some(todo(1, 10)));
        assert_eq!(todos.get(&Key::from(2)).unwrap(), None);

        let index = todos.index("userId").unwrap();
        assert_eq!(index.get(&Key::from(10)).unwrap(), Some(todo(1, 10)));
        assert_eq!(index.get(&Key::from(99)).unwrap(), None);
    }

    #[test]
    fn dropping_an_unfinalized_scope_aborts() {
        let engine = MemoryEngine::open(&config());

        {
            let scope = engine.begin(&["todos".into()]).unwrap();
            let todos = scope.collection("todos").unwrap();
            todos.put(None, &todo(1, 10)).unwrap();
        }

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        assert_eq!(todos.get(&Key::from(1)).unwrap(), None);
    }

    #[test]
    fn row_cursor_walks_both_directions() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        for id in 1..=5 {
            todos.put(None, &todo(id, id * 10)).unwrap();
        }

        let mut cursor = todos
            .open_cursor(&KeyRange::unbounded(), Direction::Reverse)
            .unwrap();
        let mut keys = Vec::new();
        while let Some(entry) = cursor.advance().unwrap() {
            keys.push(entry.primary_key);
        }
        assert_eq!(
            keys,
            vec![
                Key::from(5),
                Key::from(4),
                Key::from(3),
                Key::from(2),
                Key::from(1)
            ]
        );
    }

    #[test]
    fn row_cursor_observes_deletes_between_advances() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        for id in 1..=3 {
            todos.put(None, &todo(id, id)).unwrap();
        }

        let mut cursor = todos
            .open_cursor(&KeyRange::unbounded(), Direction::Forward)
            .unwrap();
        let first = cursor.advance().unwrap().unwrap();
        todos.delete(&first.primary_key).unwrap();
        todos.delete(&Key::from(2)).unwrap();

        let second = cursor.advance().unwrap().unwrap();
        assert_eq!(second.primary_key, Key::from(3));
        assert!(cursor.advance().unwrap().is_none());
    }

    #[test]
    fn unique_index_cursor_skips_duplicate_values() {
        let engine = MemoryEngine::open(&config());
        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        for (id, user) in [(1, 5), (2, 5), (3, 7), (4, 7), (5, 9)] {
            todos.put(None, &todo(id, user)).unwrap();
        }

        let index = todos.index("userId").unwrap();
        let mut cursor = index
            .open_cursor(&KeyRange::unbounded(), Direction::ForwardUnique)
            .unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = cursor.advance().unwrap() {
            seen.push((entry.key, entry.primary_key));
        }
        assert_eq!(
            seen,
            vec![
                (Key::from(5), Key::from(1)),
                (Key::from(7), Key::from(3)),
                (Key::from(9), Key::from(5)),
            ]
        );

        let mut cursor = index
            .open_cursor(&KeyRange::unbounded(), Direction::ReverseUnique)
            .unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = cursor.advance().unwrap() {
            seen.push((entry.key, entry.primary_key));
        }
        assert_eq!(
            seen,
            vec![
                (Key::from(9), Key::from(5)),
                (Key::from(7), Key::from(3)),
                (Key::from(5), Key::from(1)),
            ]
        );
    }

    #[test]
    fn migrate_applies_the_schema_delta() {
        let engine = MemoryEngine::open(&config());

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        todos.put(None, &todo(1, 10)).unwrap();
        scope.commit().unwrap();

        // v2 drops `events`, keeps `todos`, and adds an index over `id`.
        let next = DatabaseConfig::new("app", 2)
            .unwrap()
            .collection(
                CollectionModel::new("todos")
                    .unwrap()
                    .key_path("id")
                    .unwrap()
                    .index(IndexModel::new("userId", "userId").unwrap())
                    .unwrap()
                    .index(IndexModel::new("byId", "id").unwrap())
                    .unwrap(),
            )
            .unwrap();
        engine.migrate(&next).unwrap();
        assert_eq!(engine.version(), 2);

        assert!(engine.begin(&["events".into()]).is_err());

        let scope = engine.begin(&["todos".into()]).unwrap();
        let todos = scope.collection("todos").unwrap();
        // The new index was rebuilt from the surviving rows.
        let by_id = todos.index("byId").unwrap();
        assert_eq!(by_id.get(&Key::from(1)).unwrap(), Some(todo(1, 10)));
    }

    #[test]
    fn migrate_rejects_version_regression_and_name_mismatch() {
        let engine = MemoryEngine::open(&config());

        assert!(matches!(
            engine.migrate(&config()),
            Err(EngineError::VersionRegression { .. })
        ));
        assert!(matches!(
            engine.migrate(&DatabaseConfig::new("other", 9).unwrap()),
            Err(EngineError::NameMismatch { .. })
        ));
    }

    #[test]
    fn only_one_scope_may_be_open() {
        let engine = MemoryEngine::open(&config());

        let scope = engine.begin(&["todos".into()]).unwrap();
        assert!(matches!(
            engine.begin(&["todos".into()]),
            Err(EngineError::ScopeActive)
        ));
        scope.commit().unwrap();

        assert!(engine.begin(&["todos".into()]).is_ok());
    }
}

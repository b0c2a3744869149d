//! Per-collection operation surface.
//!
//! Each call builds one options record, resolves it to exactly one access
//! path, and executes that path against the open scope's collection
//! handle. A failed call is recorded on the scope so the enclosing
//! transactional call rejects even if caller logic swallows the error.

use crate::{
    db::{
        cursor::{open_walk_cursor, walk_map, walk_patch, walk_retain, WalkStats},
        request::{Predicate, Request},
        resolve::{resolve_fetch, resolve_remove, resolve_upsert, FetchPath, RemovePath, UpsertPath},
        response::{FetchResult, UpsertOutcome},
        txn::Scope,
    },
    engine::CollectionHandle,
    error::{Error, ErrorOrigin},
    key::Key,
    obs::{CallKind, TraceAccess, TraceEvent},
};

///
/// Collection
///
/// Request surface for one collection inside an open scope. Borrowed from
/// the scope; every call settles synchronously with a value or an error.
///

pub struct Collection<'s> {
    name: String,
    handle: Box<dyn CollectionHandle>,
    scope: &'s Scope,
}

impl<'s> Collection<'s> {
    pub(crate) fn new(name: String, handle: Box<dyn CollectionHandle>, scope: &'s Scope) -> Self {
        Self {
            name,
            handle,
            scope,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch records per the request shape: direct lookup, range access,
    /// or a mapping cursor walk.
    pub fn fetch(&self, request: Request<'_>) -> Result<FetchResult, Error> {
        self.observe(self.run_fetch(request))
    }

    /// Write records per the request shape: direct put, or an updating
    /// cursor walk driven by a patch predicate.
    pub fn upsert(&self, request: Request<'_>) -> Result<UpsertOutcome, Error> {
        self.observe(self.run_upsert(request))
    }

    /// Insert one record, rejecting with a conflict if its key exists.
    pub fn add(&self, request: Request<'_>) -> Result<Key, Error> {
        self.observe(self.run_add(request))
    }

    /// Delete records per the request shape: direct delete, retaining
    /// cursor walk, or clear. Reports nothing on success.
    pub fn remove(&self, request: Request<'_>) -> Result<(), Error> {
        self.observe(self.run_remove(request))
    }

    fn run_fetch(&self, request: Request<'_>) -> Result<FetchResult, Error> {
        self.scope.ensure_open()?;
        let path = resolve_fetch(request)?;
        self.emit_resolved(CallKind::Fetch, path.trace_access());

        match path {
            FetchPath::ByKey(key) => Ok(FetchResult::One(self.handle.get(&key)?)),
            FetchPath::Scan { range, count } => {
                Ok(FetchResult::Many(self.handle.get_range(&range, count)?))
            }
            FetchPath::IndexKey { index, key } => {
                Ok(FetchResult::One(self.handle.index(&index)?.get(&key)?))
            }
            FetchPath::IndexScan {
                index,
                range,
                count,
            } => Ok(FetchResult::Many(
                self.handle.index(&index)?.get_all(&range, count)?,
            )),
            FetchPath::Walk(plan) => {
                let Predicate::Map(map) = plan.predicate else {
                    return Err(Error::internal(
                        ErrorOrigin::Cursor,
                        "fetch walk resolved with a non-map predicate",
                    ));
                };
                let count = plan.count;
                let mut cursor = open_walk_cursor(self.handle.as_ref(), &plan)?;
                let (values, stats) = walk_map(cursor.as_mut(), map, count)?;
                self.emit_walk(stats);
                Ok(FetchResult::Many(values))
            }
        }
    }

    fn run_upsert(&self, request: Request<'_>) -> Result<UpsertOutcome, Error> {
        self.scope.ensure_open()?;
        let path = resolve_upsert(request)?;
        self.emit_resolved(CallKind::Upsert, path.trace_access());

        match path {
            UpsertPath::Put { key, value } => {
                let key = self.handle.put(key, &value)?;
                Ok(UpsertOutcome { keys: vec![key] })
            }
            UpsertPath::Walk(plan) => {
                let Predicate::Patch(patch) = plan.predicate else {
                    return Err(Error::internal(
                        ErrorOrigin::Cursor,
                        "upsert walk resolved with a non-patch predicate",
                    ));
                };
                let count = plan.count;
                let mut cursor = open_walk_cursor(self.handle.as_ref(), &plan)?;
                let (keys, stats) = walk_patch(self.handle.as_ref(), cursor.as_mut(), patch, count)?;
                self.emit_walk(stats);
                Ok(UpsertOutcome { keys })
            }
        }
    }

    fn run_add(&self, request: Request<'_>) -> Result<Key, Error> {
        self.scope.ensure_open()?;

        // Add takes the direct-write shape only; cursor shapes have no
        // insert-or-fail meaning.
        match resolve_upsert(request)? {
            UpsertPath::Put { key, value } => {
                self.emit_resolved(CallKind::Add, TraceAccess::Put);
                Ok(self.handle.add(key, &value)?)
            }
            UpsertPath::Walk(_) => Err(Error::contract(
                ErrorOrigin::Resolver,
                "unsupported combination of request fields for add",
            )),
        }
    }

    fn run_remove(&self, request: Request<'_>) -> Result<(), Error> {
        self.scope.ensure_open()?;
        let path = resolve_remove(request)?;
        self.emit_resolved(CallKind::Remove, path.trace_access());

        match path {
            RemovePath::ByKey(key) => Ok(self.handle.delete(&key)?),
            RemovePath::Walk(plan) => {
                let Predicate::Retain(retain) = plan.predicate else {
                    return Err(Error::internal(
                        ErrorOrigin::Cursor,
                        "remove walk resolved with a non-retain predicate",
                    ));
                };
                let mut cursor = open_walk_cursor(self.handle.as_ref(), &plan)?;
                let stats = walk_retain(self.handle.as_ref(), cursor.as_mut(), retain)?;
                self.emit_walk(stats);
                Ok(())
            }
            RemovePath::Clear => Ok(self.handle.clear()?),
        }
    }

    /// Record a failed call on the scope before handing it back.
    fn observe<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &result {
            self.scope.record_failure(err);
        }
        result
    }

    fn emit_resolved(&self, call: CallKind, access: TraceAccess) {
        if let Some(sink) = self.scope.trace() {
            sink.on_event(TraceEvent::Resolved {
                collection: self.name.clone(),
                call,
                access,
            });
        }
    }

    fn emit_walk(&self, stats: WalkStats) {
        if let Some(sink) = self.scope.trace() {
            sink.on_event(TraceEvent::WalkFinished {
                collection: self.name.clone(),
                visited: stats.visited,
                emitted: stats.emitted,
            });
        }
    }
}

//! Operation resolution.
//!
//! Given one options record and the call kind, select exactly one access
//! path. Guards are ordered and the first match wins: direct lookup takes
//! precedence over range access, range access over cursor walks. The
//! ordering is part of the public contract.

use crate::{
    db::{
        range::build_range,
        request::{Predicate, Request},
    },
    engine::Direction,
    error::{Error, ErrorOrigin},
    key::{Key, KeyRange},
    obs::TraceAccess,
};
use serde_json::Value;
use thiserror::Error as ThisError;

///
/// ResolveError
///

#[derive(Clone, Debug, ThisError)]
pub enum ResolveError {
    #[error("unsupported combination of request fields for {call}")]
    UnsupportedShape { call: &'static str },

    #[error("{call} predicate is not callable as {expected} (found {found})")]
    PredicateNotCallable {
        call: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        Self::contract(ErrorOrigin::Resolver, err.to_string())
    }
}

///
/// WalkPlan
///
/// Everything a cursor walk needs: source (collection or named index),
/// bounds, direction, truncation, and the per-entry predicate.
///

#[derive(Debug)]
pub(crate) struct WalkPlan<'a> {
    pub index: Option<String>,
    pub range: KeyRange,
    pub direction: Direction,
    pub count: Option<usize>,
    pub predicate: Predicate<'a>,
}

impl WalkPlan<'_> {
    pub(crate) fn trace_access(&self) -> TraceAccess {
        TraceAccess::Walk {
            indexed: self.index.is_some(),
        }
    }
}

///
/// FetchPath
///

#[derive(Debug)]
pub(crate) enum FetchPath<'a> {
    ByKey(Key),
    Scan {
        range: KeyRange,
        count: Option<usize>,
    },
    IndexKey {
        index: String,
        key: Key,
    },
    IndexScan {
        index: String,
        range: KeyRange,
        count: Option<usize>,
    },
    Walk(WalkPlan<'a>),
}

impl FetchPath<'_> {
    pub(crate) fn trace_access(&self) -> TraceAccess {
        match self {
            Self::ByKey(_) => TraceAccess::ByKey,
            Self::Scan { .. } => TraceAccess::KeyRange,
            Self::IndexKey { index, .. } => TraceAccess::IndexKey {
                index: index.clone(),
            },
            Self::IndexScan { index, .. } => TraceAccess::IndexRange {
                index: index.clone(),
            },
            Self::Walk(plan) => plan.trace_access(),
        }
    }
}

///
/// UpsertPath
///

#[derive(Debug)]
pub(crate) enum UpsertPath<'a> {
    Put { key: Option<Key>, value: Value },
    Walk(WalkPlan<'a>),
}

impl UpsertPath<'_> {
    pub(crate) fn trace_access(&self) -> TraceAccess {
        match self {
            Self::Put { .. } => TraceAccess::Put,
            Self::Walk(plan) => plan.trace_access(),
        }
    }
}

///
/// RemovePath
///

#[derive(Debug)]
pub(crate) enum RemovePath<'a> {
    ByKey(Key),
    Walk(WalkPlan<'a>),
    Clear,
}

impl RemovePath<'_> {
    pub(crate) fn trace_access(&self) -> TraceAccess {
        match self {
            Self::ByKey(_) => TraceAccess::ByKey,
            Self::Walk(plan) => plan.trace_access(),
            Self::Clear => TraceAccess::Clear,
        }
    }
}

/// Check the predicate kind for a call before any walk starts.
fn walk_plan<'a>(
    request: Request<'a>,
    predicate: Predicate<'a>,
    call: &'static str,
    expected: &'static str,
) -> Result<WalkPlan<'a>, ResolveError> {
    let callable = matches!(
        (expected, &predicate),
        ("map", Predicate::Map(_))
            | ("patch", Predicate::Patch(_))
            | ("retain", Predicate::Retain(_))
    );
    if !callable {
        return Err(ResolveError::PredicateNotCallable {
            call,
            expected,
            found: predicate.kind(),
        });
    }

    Ok(WalkPlan {
        index: request.index,
        range: build_range(&request.query),
        direction: request.direction,
        count: request.count,
        predicate,
    })
}

/// Resolve a fetch request to exactly one access path.
///
/// Arms are ordered, first match wins: direct lookup over range access,
/// range access over cursor walks.
pub(crate) fn resolve_fetch(mut request: Request<'_>) -> Result<FetchPath<'_>, ResolveError> {
    match (
        request.key.take(),
        request.index.take(),
        request.predicate,
    ) {
        (Some(key), None, None) => Ok(FetchPath::ByKey(key)),
        (None, None, None) => Ok(FetchPath::Scan {
            range: build_range(&request.query),
            count: request.count,
        }),
        (Some(key), Some(index), None) => Ok(FetchPath::IndexKey { index, key }),
        (None, Some(index), None) => Ok(FetchPath::IndexScan {
            range: build_range(&request.query),
            count: request.count,
            index,
        }),
        (_, index, Some(predicate)) => {
            request.index = index;
            walk_plan(request, predicate, "fetch", "map").map(FetchPath::Walk)
        }
    }
}

/// Resolve an upsert request: direct write and cursor update are mutually
/// exclusive.
pub(crate) fn resolve_upsert(mut request: Request<'_>) -> Result<UpsertPath<'_>, ResolveError> {
    match (request.value.take(), request.predicate) {
        (Some(value), None) => Ok(UpsertPath::Put {
            key: request.key.take(),
            value,
        }),
        (None, Some(predicate)) => {
            walk_plan(request, predicate, "upsert", "patch").map(UpsertPath::Walk)
        }
        _ => Err(ResolveError::UnsupportedShape { call: "upsert" }),
    }
}

/// Resolve a remove request to direct delete, cursor delete, or clear.
pub(crate) fn resolve_remove(mut request: Request<'_>) -> Result<RemovePath<'_>, ResolveError> {
    match (request.key.take(), request.predicate) {
        (Some(key), None) => Ok(RemovePath::ByKey(key)),
        (_, Some(predicate)) => {
            walk_plan(request, predicate, "remove", "retain").map(RemovePath::Walk)
        }
        (None, None) => Ok(RemovePath::Clear),
    }
}

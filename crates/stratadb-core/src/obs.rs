//! Operation tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! execution semantics. Sinks receive one event per resolved operation and
//! per scope transition, which is also how routing is asserted in tests.

///
/// TraceSink
///

pub trait TraceSink: Send + Sync {
    fn on_event(&self, event: TraceEvent);
}

///
/// CallKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    Fetch,
    Upsert,
    Remove,
    Add,
}

///
/// TraceAccess
///
/// The access path an operation resolved to. Exactly one per call.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceAccess {
    ByKey,
    KeyRange,
    IndexKey { index: String },
    IndexRange { index: String },
    Walk { indexed: bool },
    Put,
    Clear,
}

///
/// TraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceEvent {
    Resolved {
        collection: String,
        call: CallKind,
        access: TraceAccess,
    },
    WalkFinished {
        collection: String,
        visited: u64,
        emitted: u64,
    },
    ScopeOpened {
        collections: usize,
    },
    ScopeCommitted,
    ScopeAborted,
}

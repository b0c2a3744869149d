//! Scope lifecycle and settlement.
//!
//! A transactional call opens one scope over a declared collection set,
//! runs caller logic against it, then settles: commit when the logic and
//! every operation inside it succeeded, abort otherwise. Settlement is
//! exactly-once; a failure recorded by any operation overrides an `Ok`
//! returned by caller logic.

use crate::{
    db::ops::Collection,
    engine::{EngineScope, StorageEngine},
    error::{Error, ErrorOrigin},
    obs::{TraceEvent, TraceSink},
};
use std::{
    cell::{Cell, RefCell},
    fmt,
};
use thiserror::Error as ThisError;

///
/// ScopeError
///

#[derive(Clone, Debug, ThisError)]
pub enum ScopeError {
    #[error("scope is {state} and cannot accept requests")]
    NotOpen { state: ScopeState },
}

impl From<ScopeError> for Error {
    fn from(err: ScopeError) -> Self {
        Self::contract(ErrorOrigin::Transaction, err.to_string())
    }
}

///
/// ScopeState
///
/// Idle -> Open -> Committing -> Completed, with Aborted reachable from
/// Open and Committing. Requests are accepted only while Open.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScopeState {
    #[default]
    Idle,
    Open,
    Committing,
    Completed,
    Aborted,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        write!(f, "{label}")
    }
}

///
/// Scope
///
/// One open transactional scope. Caller logic borrows it for the duration
/// of the call; the coordinator owns settlement.
///

pub struct Scope {
    inner: Box<dyn EngineScope>,
    state: Cell<ScopeState>,
    failure: RefCell<Option<Error>>,
    trace: Option<&'static dyn TraceSink>,
}

impl Scope {
    fn open(
        engine: &dyn StorageEngine,
        collections: &[String],
        trace: Option<&'static dyn TraceSink>,
    ) -> Result<Self, Error> {
        let state = Cell::new(ScopeState::Idle);
        let inner = engine.begin(collections)?;
        state.set(ScopeState::Open);

        if let Some(sink) = trace {
            sink.on_event(TraceEvent::ScopeOpened {
                collections: collections.len(),
            });
        }

        Ok(Self {
            inner,
            state,
            failure: RefCell::new(None),
            trace,
        })
    }

    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state.get()
    }

    /// Names of the collections this scope covers, as declared at open.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.inner.collection_names()
    }

    /// The request surface for one covered collection.
    pub fn collection(&self, name: &str) -> Result<Collection<'_>, Error> {
        self.ensure_open()?;
        let handle = self.inner.collection(name)?;

        Ok(Collection::new(name.to_string(), handle, self))
    }

    pub(crate) fn ensure_open(&self) -> Result<(), ScopeError> {
        let state = self.state.get();
        if state == ScopeState::Open {
            Ok(())
        } else {
            Err(ScopeError::NotOpen { state })
        }
    }

    /// Record a failed operation. The first failure sticks; it rejects
    /// the enclosing call even if caller logic returns `Ok`.
    pub(crate) fn record_failure(&self, err: &Error) {
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(err.clone());
        }
    }

    pub(crate) fn trace(&self) -> Option<&'static dyn TraceSink> {
        self.trace
    }

    /// Settle the scope exactly once: commit on a clean `Ok`, abort on
    /// any failure. A commit failure rejects the call as a scope abort.
    fn settle<R>(self, outcome: Result<R, Error>) -> Result<R, Error> {
        let recorded = self.failure.borrow_mut().take();
        let verdict = match outcome {
            Ok(value) => match recorded {
                None => Ok(value),
                Some(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        let Self {
            inner,
            state,
            trace,
            ..
        } = self;

        match verdict {
            Ok(value) => {
                state.set(ScopeState::Committing);
                match inner.commit() {
                    Ok(()) => {
                        state.set(ScopeState::Completed);
                        if let Some(sink) = trace {
                            sink.on_event(TraceEvent::ScopeCommitted);
                        }
                        Ok(value)
                    }
                    Err(err) => {
                        state.set(ScopeState::Aborted);
                        if let Some(sink) = trace {
                            sink.on_event(TraceEvent::ScopeAborted);
                        }
                        Err(Error::scope_aborted(err.to_string()))
                    }
                }
            }
            Err(err) => {
                state.set(ScopeState::Aborted);
                inner.abort();
                if let Some(sink) = trace {
                    sink.on_event(TraceEvent::ScopeAborted);
                }
                Err(err)
            }
        }
    }
}

///
/// Database
///
/// Entry point: an injected storage engine plus optional tracing. All
/// record access happens inside a transactional call.
///

pub struct Database<E: StorageEngine> {
    engine: E,
    trace: Option<&'static dyn TraceSink>,
}

impl<E: StorageEngine> Database<E> {
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self {
            engine,
            trace: None,
        }
    }

    #[must_use]
    pub const fn trace_sink(mut self, sink: &'static dyn TraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.engine.collection_names()
    }

    /// Run caller logic inside one scope over `collections`. An empty
    /// slice covers every collection the engine knows.
    ///
    /// The call settles with the logic's value only when the scope
    /// commits; any operation failure or logic error aborts the scope and
    /// rejects the call with the earliest failure.
    pub fn transact<R>(
        &self,
        collections: &[&str],
        logic: impl FnOnce(&Scope) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let names: Vec<String> = if collections.is_empty() {
            self.engine.collection_names()
        } else {
            collections.iter().map(ToString::to_string).collect()
        };
        let scope = Scope::open(&self.engine, &names, self.trace)?;
        let outcome = logic(&scope);

        scope.settle(outcome)
    }

    /// Open and immediately commit an empty scope, settling with the
    /// names of the covered collections. An empty slice covers every
    /// collection the engine knows.
    pub fn touch(&self, collections: &[&str]) -> Result<Vec<String>, Error> {
        self.transact(collections, |scope| Ok(scope.collection_names()))
    }
}

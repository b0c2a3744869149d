//! Record access layer.
//!
//! One options record per call, resolved to exactly one access path and
//! executed inside a transactional scope. `txn` owns the scope lifecycle,
//! `resolve` the routing, `range` the bound translation, and `cursor` the
//! walk drivers.

pub mod ops;
pub mod range;
pub mod request;
pub mod resolve;
pub mod response;
pub mod txn;

mod cursor;


pub use ops::Collection;
pub use range::Bounds;
pub use request::{Predicate, Request};
pub use response::{FetchResult, UpsertOutcome};
pub use txn::{Database, Scope, ScopeState};

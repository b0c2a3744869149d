//! Record-oriented transactional storage core.
//!
//! Field-presence request resolution, inclusive key ranges, cursors that
//! advance on demand, and exactly-once scope settlement over an injected
//! ordered key-value engine with secondary indexes. The in-memory engine
//! in `engine::memory` is the reference implementation of the port.

pub mod db;
pub mod engine;
pub mod error;
pub mod key;
pub mod obs;
pub mod schema;
pub mod serialize;

pub mod prelude {
    pub use crate::{
        db::{Bounds, Collection, Database, FetchResult, Predicate, Request, UpsertOutcome},
        engine::{Direction, MemoryEngine, StorageEngine},
        error::{Error, ErrorClass, ErrorOrigin},
        key::{Key, KeyPath, KeyRange},
        schema::{CollectionModel, DatabaseConfig, IndexModel},
    };
}

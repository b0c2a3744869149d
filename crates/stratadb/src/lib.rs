//! Top-level facade over the storage core.
//!
//! ## Crate layout
//! - `core`: request resolution, key model, cursors, scopes, and the
//!   storage engine port with its in-memory reference engine.
//!
//! The `prelude` module mirrors the surface application code uses: build a
//! [`core::schema::DatabaseConfig`], open an engine against it, then run
//! every record access inside [`core::db::Database::transact`].

pub use stratadb_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::error::Error;

pub mod prelude {
    pub use crate::core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use serde_json::json;

    #[test]
    fn version_matches_the_workspace() {
        assert_eq!(VERSION, "0.4.2");
    }

    #[test]
    fn facade_surface_reaches_the_core() {
        let config = DatabaseConfig::new("app", 1)
            .unwrap()
            .collection(
                CollectionModel::new("items")
                    .unwrap()
                    .key_path("id")
                    .unwrap(),
            )
            .unwrap();
        let db = Database::new(MemoryEngine::open(&config));

        db.transact(&["items"], |scope| {
            scope
                .collection("items")?
                .upsert(Request::new().value(json!({"id": 1})))
        })
        .unwrap();

        let record = db
            .transact(&["items"], |scope| {
                scope.collection("items")?.fetch(Request::new().key(1))
            })
            .unwrap()
            .into_record();
        assert_eq!(record, Some(json!({"id": 1})));
    }
}

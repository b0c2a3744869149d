use crate::{
    error::{Error, ErrorOrigin},
    key::{KeyError, KeyPath},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// SchemaError
///

#[derive(Clone, Debug, ThisError)]
pub enum SchemaError {
    #[error("malformed {kind} name: {name:?}")]
    MalformedName { kind: &'static str, name: String },

    #[error("duplicate {kind} name: {name:?}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{0}")]
    KeyPath(#[from] KeyError),
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::contract(ErrorOrigin::Schema, err.to_string())
    }
}

/// Validate a collection or index identifier.
///
/// Identifiers must be non-empty and contain no whitespace; anything else
/// is a caller contract violation.
pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(SchemaError::MalformedName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

///
/// IndexModel
///
/// A derived ordered mapping from an indexed field's value to record keys,
/// defined over exactly one collection. Non-unique by default.
///

#[derive(Clone, Debug)]
pub struct IndexModel {
    pub name: String,
    pub key_path: KeyPath,
    pub unique: bool,
    pub multi_entry: bool,
}

impl IndexModel {
    pub fn new(name: &str, key_path: &str) -> Result<Self, SchemaError> {
        validate_name("index", name)?;

        Ok(Self {
            name: name.to_string(),
            key_path: KeyPath::parse(key_path)?,
            unique: false,
            multi_entry: false,
        })
    }

    /// Reject duplicate indexed values.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Expand array-valued fields into one index entry per element.
    #[must_use]
    pub const fn multi_entry(mut self) -> Self {
        self.multi_entry = true;
        self
    }
}

///
/// CollectionModel
///
/// Definition of one named, key-ordered store of records.
///

#[derive(Clone, Debug)]
pub struct CollectionModel {
    pub name: String,
    pub key_path: Option<KeyPath>,
    pub auto_increment: bool,
    pub indexes: Vec<IndexModel>,
}

impl CollectionModel {
    pub fn new(name: &str) -> Result<Self, SchemaError> {
        validate_name("collection", name)?;

        Ok(Self {
            name: name.to_string(),
            key_path: None,
            auto_increment: false,
            indexes: Vec::new(),
        })
    }

    /// Derive primary keys from this record field path.
    pub fn key_path(mut self, path: &str) -> Result<Self, SchemaError> {
        self.key_path = Some(KeyPath::parse(path)?);
        Ok(self)
    }

    /// Allocate integer keys for records without an explicit or derived key.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn index(mut self, index: IndexModel) -> Result<Self, SchemaError> {
        if self.indexes.iter().any(|existing| existing.name == index.name) {
            return Err(SchemaError::DuplicateName {
                kind: "index",
                name: index.name,
            });
        }
        self.indexes.push(index);
        Ok(self)
    }

    #[must_use]
    pub fn index_model(&self, name: &str) -> Option<&IndexModel> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

///
/// DatabaseConfig
///
/// Immutable description of a named, versioned database: its collections
/// and their indexes. Assembled once through the consuming builder methods;
/// the engine diffs an open database against this on migration.
///

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub name: String,
    pub version: u32,
    pub collections: Vec<CollectionModel>,
}

impl DatabaseConfig {
    pub fn new(name: &str, version: u32) -> Result<Self, SchemaError> {
        validate_name("database", name)?;

        Ok(Self {
            name: name.to_string(),
            version,
            collections: Vec::new(),
        })
    }

    pub fn collection(mut self, model: CollectionModel) -> Result<Self, SchemaError> {
        if self
            .collections
            .iter()
            .any(|existing| existing.name == model.name)
        {
            return Err(SchemaError::DuplicateName {
                kind: "collection",
                name: model.name,
            });
        }
        self.collections.push(model);
        Ok(self)
    }

    #[must_use]
    pub fn collection_names(&self) -> BTreeSet<String> {
        self.collections
            .iter()
            .map(|model| model.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_names_are_rejected() {
        assert!(CollectionModel::new("").is_err());
        assert!(CollectionModel::new("has space").is_err());
        assert!(IndexModel::new("by userId", "userId").is_err());
        assert!(CollectionModel::new("todos").is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = DatabaseConfig::new("app", 1)
            .unwrap()
            .collection(CollectionModel::new("todos").unwrap())
            .unwrap();

        assert!(matches!(
            config.collection(CollectionModel::new("todos").unwrap()),
            Err(SchemaError::DuplicateName { .. })
        ));

        let model = CollectionModel::new("todos")
            .unwrap()
            .index(IndexModel::new("userId", "userId").unwrap())
            .unwrap();
        assert!(model.index(IndexModel::new("userId", "userId").unwrap()).is_err());
    }

    #[test]
    fn index_flags_compose() {
        let index = IndexModel::new("tags", "tags").unwrap().multi_entry();

        assert!(index.multi_entry);
        assert!(!index.unique);
    }
}

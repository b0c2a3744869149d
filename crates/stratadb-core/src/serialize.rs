//! Generic CBOR serialization infrastructure for stored rows.
//!
//! This module is format-level only: size policy for rows lives in the
//! engine wrappers, not here.

use crate::error::{Error, ErrorClass, ErrorOrigin};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Clone, Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),
}

impl From<SerializeError> for Error {
    fn from(err: SerializeError) -> Self {
        let class = match err {
            SerializeError::Serialize(_) => ErrorClass::Internal,
            // Stored bytes that no longer decode indicate store corruption.
            SerializeError::Deserialize(_) => ErrorClass::Engine,
        };
        Self::new(class, ErrorOrigin::Serialize, err.to_string())
    }
}

/// Serialize a value to CBOR bytes.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializeError> {
    serde_cbor::to_vec(value).map_err(|err| SerializeError::Serialize(err.to_string()))
}

/// Deserialize a value from CBOR bytes.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializeError> {
    serde_cbor::from_slice(bytes).map_err(|err| SerializeError::Deserialize(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn record_round_trips_through_cbor() {
        let record = json!({ "id": 7, "name": "ada", "tags": ["a", "b"] });

        let bytes = serialize(&record).unwrap();
        let decoded: Value = deserialize(&bytes).unwrap();

        assert_eq!(decoded, record);
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let bytes = serialize(&json!({ "id": 7 })).unwrap();

        let result: Result<Value, _> = deserialize(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }
}

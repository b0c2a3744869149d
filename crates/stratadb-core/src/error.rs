use crate::key::KeyError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable classification.
///
/// Every public operation settles with exactly one of a resolved value or
/// one of these; `class` distinguishes caller contract violations from
/// engine request failures and scope failures.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a caller contract violation.
    pub(crate) fn contract(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ContractViolation, origin, message)
    }

    /// Construct a scope-level failure that overrides caller-logic results.
    pub(crate) fn scope_aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ScopeAborted, ErrorOrigin::Transaction, message)
    }

    /// Construct an internal invariant violation for a specific origin.
    pub(crate) fn internal(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, origin, message)
    }

    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self.class, ErrorClass::ContractViolation)
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.class, ErrorClass::Conflict)
    }

    #[must_use]
    pub const fn is_scope_aborted(&self) -> bool {
        matches!(self.class, ErrorClass::ScopeAborted)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<KeyError> for Error {
    fn from(err: KeyError) -> Self {
        Self::contract(ErrorOrigin::Schema, err.to_string())
    }
}

///
/// ErrorClass
/// Failure taxonomy: contract violations are caller errors and are never
/// retried; engine failures reject the smallest enclosing operation; scope
/// failures reject the whole transactional call.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    ContractViolation,
    Conflict,
    Engine,
    ScopeAborted,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ContractViolation => "contract_violation",
            Self::Conflict => "conflict",
            Self::Engine => "engine",
            Self::ScopeAborted => "scope_aborted",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the failure.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Resolver,
    Cursor,
    Transaction,
    Engine,
    Schema,
    Serialize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolver => "resolver",
            Self::Cursor => "cursor",
            Self::Transaction => "transaction",
            Self::Engine => "engine",
            Self::Schema => "schema",
            Self::Serialize => "serialize",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_class_carries_taxonomy() {
        let err = Error::contract(ErrorOrigin::Resolver, "unsupported combination");

        assert!(err.is_contract_violation());
        assert_eq!(
            err.display_with_class(),
            "resolver:contract_violation: unsupported combination"
        );
    }
}

//! Error types: the per-field error bag and the crate's failure enums.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::registry::Arity;

/// Key under which construction errors are reported.
///
/// These errors are not tied to any field; they explain why no rule ran.
pub const DATA_ERROR_KEY: &str = "_data";

/// Errors raised while building or mutating a data source.
///
/// Every construction variant renders with an `invalid input data` prefix so
/// callers can recognise it in the error summary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid input data")]
    InvalidData,

    #[error("invalid input data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input data: {0}")]
    Body(String),

    #[error("invalid input data: unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("invalid input data: body of {size} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { size: usize, limit: usize },

    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    #[error("field '{field}' cannot hold this value: {reason}")]
    TypeMismatch { field: String, reason: String },

    #[error("field path '{0}' does not exist")]
    PathNotFound(String),
}

/// Errors in how validation was configured or driven.
///
/// These are programming mistakes, surfaced loudly rather than recorded as
/// field errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("validator '{0}' is not registered")]
    UnknownValidator(String),

    #[error("validator '{validator}' expects {expected} argument(s), got {got}")]
    Arity {
        validator: String,
        expected: Arity,
        got: usize,
    },

    #[error("filter '{0}' is not registered")]
    UnknownFilter(String),

    #[error("validation already ran; call reset_result() before validating again")]
    AlreadyValidated,

    #[error("global options are already initialized")]
    GlobalAlreadyInitialized,

    #[error("configuration error: {0}")]
    Options(String),
}

/// A filter could not transform a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FilterError {
    /// The filter that failed
    pub filter: String,
    /// Human-readable reason
    pub message: String,
}

impl FilterError {
    /// Create a new filter error.
    pub fn new(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// Collection of validation errors, keyed by field in insertion order.
///
/// Each field present holds at least one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Errors {
    #[serde(flatten)]
    fields: IndexMap<String, Vec<String>>,
}

impl Errors {
    /// Create an empty error collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Merge another collection into this one, preserving order.
    pub fn merge(&mut self, other: Errors) {
        for (field, messages) in other.fields {
            for message in messages {
                self.add(field.clone(), message);
            }
        }
    }

    /// Check if there are any errors.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get the total number of messages.
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// Check whether a field has errors.
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All messages for a field.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// The first message for a field.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// The first message of the first failing field.
    pub fn one(&self) -> Option<&str> {
        self.fields
            .values()
            .next()
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Field names with errors, in the order they failed.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over `(field, messages)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    /// Convert to Result - Ok if no errors, Err otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, messages)) in self.fields.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", field, messages.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_add_and_get() {
        let mut errors = Errors::new();
        errors.add("email", "Invalid email");
        errors.add("email", "Email is required");
        errors.add("age", "Age out of range");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.field("email").unwrap().len(), 2);
        assert_eq!(errors.first("email"), Some("Invalid email"));
        assert_eq!(errors.first("name"), None);
        assert!(errors.has("age"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn errors_keep_insertion_order() {
        let mut errors = Errors::new();
        errors.add("zeta", "z");
        errors.add("alpha", "a");
        errors.add("zeta", "z2");

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(errors.one(), Some("z"));
    }

    #[test]
    fn errors_summary() {
        let mut errors = Errors::new();
        errors.add("name", "name min length is 7");
        errors.add("age", "too old");
        errors.add("age", "not even");

        assert_eq!(
            errors.to_string(),
            "name: name min length is 7\nage: too old; not even"
        );
    }

    #[test]
    fn errors_into_result() {
        assert!(Errors::new().into_result().is_ok());

        let mut errors = Errors::new();
        errors.add("field", "message");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn errors_merge() {
        let mut first = Errors::new();
        first.add("email", "Invalid");

        let mut second = Errors::new();
        second.add("age", "Out of range");
        second.add("email", "Taken");

        first.merge(second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.field("email").unwrap(), ["Invalid", "Taken"]);
    }

    #[test]
    fn errors_serialize_as_field_map() {
        let mut errors = Errors::new();
        errors.add("email", "Invalid email format");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["email"][0], "Invalid email format");
    }

    #[test]
    fn construction_errors_mention_invalid_input() {
        assert_eq!(DataError::InvalidData.to_string(), "invalid input data");
        let err = DataError::UnsupportedContentType("text/plain".into());
        assert!(err.to_string().starts_with("invalid input data"));
    }

    proptest::proptest! {
        #[test]
        fn every_added_message_is_kept(
            entries in proptest::collection::vec(("[a-d]", "[a-z ]{1,12}"), 0..24)
        ) {
            let mut errors = Errors::new();
            for (field, message) in &entries {
                errors.add(field.as_str(), message.as_str());
            }

            proptest::prop_assert_eq!(errors.len(), entries.len());
            proptest::prop_assert_eq!(errors.is_empty(), entries.is_empty());
            proptest::prop_assert_eq!(errors.one(), entries.first().map(|(_, m)| m.as_str()));
            for (field, message) in &entries {
                proptest::prop_assert!(errors.field(field).unwrap().contains(message));
            }
        }
    }
}

//! Data sources: the uniform view validators have over input data.
//!
//! Four shapes are supported, all behind [`DataSource`]:
//!
//! - [`MapData`] - a JSON object, built from a map or decoded from JSON text
//! - [`FormData`] - multi-valued string data with optional uploaded files
//! - [`StructData`] - a typed record described by a [`Fields`] table
//! - HTTP requests, decoded by [`from_request`] into one of the above
//!
//! Field paths use `.` to address nested values (`extra.github`).

mod form;
mod map;
mod record;
mod request;

use serde_json::Value;
use std::any::Any;

use crate::engine::Validation;
use crate::error::DataError;
use crate::translator::Messages;
use crate::value::Kind;

pub use form::{FormData, UploadedFile};
pub use map::MapData;
pub use record::{
    assign, declared_rules, get_path, kind_of_path, set_path, table, to_value, FieldDescriptor,
    Fields, NestedAccess, Record, StructData,
};
pub use request::{from_request, from_request_with_limit, parse_multipart, MultipartPart};

/// Rules declared alongside the data, e.g. on record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRule {
    /// Field path the rules apply to
    pub field: String,
    /// Pipe-delimited rule text, may be empty
    pub rules: String,
    /// Pipe-delimited filter names, if any
    pub filters: Option<String>,
}

/// Uniform access to input data.
///
/// `get` returns `None` when any path segment is missing; it never errors.
/// `set` writes into the backing structure so later rules observe the new
/// value.
///
/// The capability methods (`messages`, `translations`, `configure`,
/// `declared_rules`) default to "nothing to offer"; the engine consults them
/// once, when it is created.
pub trait DataSource: Send + 'static {
    /// Resolve a field path.
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a value at a field path.
    fn set(&mut self, field: &str, value: Value) -> Result<(), DataError>;

    /// The kind stored at a path, `Kind::Unknown` if unresolvable.
    fn kind_of(&self, field: &str) -> Kind;

    /// All top-level field names.
    fn field_names(&self) -> Vec<String>;

    /// An uploaded file, for sources that carry them.
    fn file(&self, _field: &str) -> Option<&UploadedFile> {
        None
    }

    /// Rules declared by the data itself.
    fn declared_rules(&self) -> Vec<DeclaredRule> {
        Vec::new()
    }

    /// Message templates supplied by the data.
    fn messages(&self) -> Option<Messages> {
        None
    }

    /// Field display names supplied by the data.
    fn translations(&self) -> Option<Messages> {
        None
    }

    /// Hook to register further rules or settings on a new engine.
    fn configure(&self, _validation: &mut Validation) {}

    /// Access the concrete source, e.g. to read a validated record back.
    fn as_any(&self) -> &dyn Any;
}

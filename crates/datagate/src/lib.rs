//! # datagate
//!
//! Rule-driven validation for maps, JSON, typed records and HTTP form data.
//!
//! Rules are declared in code or in a compact string form
//! (`required|int:1,99`), optionally preceded by filters (`trim|int`) and
//! grouped into scenes. A run collects per-field messages in [`Errors`] and,
//! on success, exposes the validated values as safe data.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut v = datagate::json(r#"{"name": "inhere", "age": 100}"#);
//! v.set_stop_on_error(false);
//! v.string_rules([("name", "required|minLen:7"), ("age", "int|range:1,99")]);
//!
//! if !v.validate() {
//!     // name: name min length is 7
//!     // age: age value must be in the range 1 - 99
//!     println!("{}", v.errors());
//! }
//! ```
//!
//! ## Records
//!
//! ```rust,ignore
//! use datagate::{Fields, Record};
//!
//! #[derive(Serialize, Deserialize, Fields)]
//! struct User {
//!     #[validate(rules = "required|minLen:7")]
//!     name: String,
//!     #[validate(rules = "int:1,99", filter = "int")]
//!     age: u32,
//! }
//!
//! impl Record for User {}
//!
//! let mut v = datagate::record(user);
//! v.validate();
//! ```
//!
//! ## Feature Flags
//!
//! - `derive` - `#[derive(Fields)]` for records (default)
//! - `tracing` - debug and trace logging through `tracing` (default)
//! - `env` - [`GlobalOptions::from_env`] (default)

// Lets generated code name `::datagate` inside this crate's own tests.
extern crate self as datagate;

#[macro_use]
mod tracing_macros;

pub mod config;
pub mod data;
mod engine;
mod error;
pub mod filters;
pub mod parser;
pub mod registry;
mod rule;
pub mod translator;
mod validators;
pub mod value;

pub use config::{configure, global_options, GlobalOptions};
pub use data::{
    DataSource, DeclaredRule, FieldDescriptor, FormData, MapData, NestedAccess, Record,
    StructData, UploadedFile,
};
pub use engine::{State, Validation};
pub use error::{ConfigError, DataError, Errors, FilterError, DATA_ERROR_KEY};
pub use registry::CheckFunc;
pub use rule::{IntoArgs, Rule, EXCLUDE};
pub use serde_json::{Map, Value};
pub use translator::{Messages, Translator};
pub use value::Kind;

// The trait and its derive share a name, like `serde::Serialize`.
pub use data::Fields;
#[cfg(feature = "derive")]
pub use datagate_macros::Fields;

use http::Request;

/// Validate a JSON object.
pub fn map(map: Map<String, Value>) -> Validation {
    Validation::new(MapData::new(map))
}

/// Validate any JSON value; anything but an object fails with
/// `invalid input data`.
pub fn value(value: Value) -> Validation {
    Validation::from_result(MapData::from_value(value))
}

/// Validate JSON text.
pub fn json(json: &str) -> Validation {
    Validation::from_result(MapData::from_json(json))
}

/// Validate JSON bytes.
pub fn json_bytes(bytes: &[u8]) -> Validation {
    Validation::from_result(MapData::from_json_bytes(bytes))
}

/// Validate a typed record, loading the rules declared on it.
pub fn record<T: Record>(record: T) -> Validation {
    Validation::new(StructData::new(record))
}

/// Validate form data.
pub fn form(form: FormData) -> Validation {
    Validation::new(form)
}

/// Validate an HTTP request's query or body.
///
/// Decoding failures (bad JSON, unsupported content type, oversized body)
/// are reported as the engine's construction error.
pub fn request<B: AsRef<[u8]>>(req: &Request<B>) -> Validation {
    match data::from_request(req) {
        Ok(data) => Validation::from_boxed(data),
        Err(err) => Validation::from_error(err),
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        ConfigError, DataSource, Errors, Fields, FilterError, FormData, MapData, Record, Rule,
        StructData, Validation, Value,
    };
}

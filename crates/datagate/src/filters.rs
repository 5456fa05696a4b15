//! Value filters: transformations applied to a field before validation.
//!
//! A filter chain is a `|`-separated list of filter names (`trim|int`),
//! applied left to right. Each step either produces a new value or a
//! [`FilterError`].

use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, FilterError};
use crate::value;

/// A user-supplied filter.
pub type FilterFn = Arc<dyn Fn(Value) -> Result<Value, FilterError> + Send + Sync>;

type BuiltinFilter = fn(Value) -> Result<Value, FilterError>;

const BUILTIN: &[(&str, BuiltinFilter)] = &[
    ("int", to_int),
    ("uint", to_uint),
    ("float", to_float),
    ("bool", to_bool),
    ("string", to_string),
    ("trim", trim),
    ("ltrim", ltrim),
    ("rtrim", rtrim),
    ("lower", lower),
    ("upper", upper),
];

const ALIASES: &[(&str, &str)] = &[
    ("toInt", "int"),
    ("integer", "int"),
    ("toUint", "uint"),
    ("toFloat", "float"),
    ("toBool", "bool"),
    ("boolean", "bool"),
    ("toString", "string"),
    ("trimSpace", "trim"),
    ("trimLeft", "ltrim"),
    ("trimRight", "rtrim"),
    ("lowercase", "lower"),
    ("toLower", "lower"),
    ("uppercase", "upper"),
    ("toUpper", "upper"),
];

/// Resolve an alias to the canonical filter name.
pub fn filter_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Split a chain into filter names.
pub fn parse_chain(chain: &str) -> Vec<String> {
    chain
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// A filter resolved for application.
#[derive(Clone)]
pub enum FilterRef<'a> {
    Builtin(&'static str, BuiltinFilter),
    Custom(&'a str, &'a FilterFn),
}

impl FilterRef<'_> {
    /// Apply the filter.
    pub fn apply(&self, value: Value) -> Result<Value, FilterError> {
        match self {
            FilterRef::Builtin(_, filter) => filter(value),
            FilterRef::Custom(_, filter) => filter(value),
        }
    }

    /// The filter name.
    pub fn name(&self) -> &str {
        match self {
            FilterRef::Builtin(name, _) => name,
            FilterRef::Custom(name, _) => name,
        }
    }
}

impl fmt::Debug for FilterRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilterRef").field(&self.name()).finish()
    }
}

/// Custom filters layered over the built-in ones.
#[derive(Clone, Default)]
pub struct Filters {
    custom: HashMap<String, FilterFn>,
}

impl Filters {
    /// Create an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom filter, replacing any earlier one with that name.
    pub fn add<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(Value) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(filter));
    }

    /// Resolve a name. Custom filters shadow built-ins.
    pub fn resolve(&self, name: &str) -> Option<FilterRef<'_>> {
        if let Some((name, filter)) = self.custom.get_key_value(name) {
            return Some(FilterRef::Custom(name, filter));
        }
        let canonical = filter_name(name);
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == canonical)
            .map(|(name, filter)| FilterRef::Builtin(*name, *filter))
    }

    /// Resolve every name of a chain, failing on the first unknown one.
    pub fn resolve_chain(&self, chain: &[String]) -> Result<Vec<FilterRef<'_>>, ConfigError> {
        chain
            .iter()
            .map(|name| {
                self.resolve(name)
                    .ok_or_else(|| ConfigError::UnknownFilter(name.clone()))
            })
            .collect()
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Apply a resolved chain left to right.
pub fn apply_chain(chain: &[FilterRef<'_>], value: Value) -> Result<Value, FilterError> {
    chain.iter().try_fold(value, |value, filter| filter.apply(value))
}

fn cannot_convert(filter: &str, value: &Value) -> FilterError {
    FilterError::new(
        filter,
        format!("cannot convert '{}' to {}", value::display(value), filter),
    )
}

fn to_int(value: Value) -> Result<Value, FilterError> {
    match &value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
        Value::Number(n) => match n.as_f64() {
            // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(Value::from(f as i64))
            }
            _ => Err(cannot_convert("int", &value)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| cannot_convert("int", &value)),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        _ => Err(cannot_convert("int", &value)),
    }
}

fn to_uint(value: Value) -> Result<Value, FilterError> {
    value::to_u64(&value)
        .map(Value::from)
        .ok_or_else(|| cannot_convert("uint", &value))
}

fn to_float(value: Value) -> Result<Value, FilterError> {
    value::to_f64(&value)
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| cannot_convert("float", &value))
}

fn to_bool(value: Value) -> Result<Value, FilterError> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "on" | "yes" | "true" => Ok(Value::Bool(true)),
            "" | "0" | "off" | "no" | "false" => Ok(Value::Bool(false)),
            _ => Err(cannot_convert("bool", &value)),
        },
        _ => Err(cannot_convert("bool", &value)),
    }
}

fn to_string(value: Value) -> Result<Value, FilterError> {
    match value {
        Value::String(_) => Ok(value),
        Value::Array(_) | Value::Object(_) => Err(cannot_convert("string", &value)),
        other => Ok(Value::String(value::display(&other))),
    }
}

/// Apply a string transform to a string or to each string of an array.
fn map_text(value: Value, f: fn(&str) -> String) -> Result<Value, FilterError> {
    Ok(match value {
        Value::String(s) => Value::String(f(&s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Value::String(f(&s)),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    })
}

fn trim(value: Value) -> Result<Value, FilterError> {
    map_text(value, |s| s.trim().to_string())
}

fn ltrim(value: Value) -> Result<Value, FilterError> {
    map_text(value, |s| s.trim_start().to_string())
}

fn rtrim(value: Value) -> Result<Value, FilterError> {
    map_text(value, |s| s.trim_end().to_string())
}

fn lower(value: Value) -> Result<Value, FilterError> {
    map_text(value, str::to_lowercase)
}

fn upper(value: Value) -> Result<Value, FilterError> {
    map_text(value, str::to_uppercase)
}

//! Record-backed data: typed structs described by a field-descriptor table.
//!
//! A record type implements [`Fields`] (normally through
//! `#[derive(Fields)]`), which lists every field with its accessor, declared
//! kind and declared rules. The table is built once per type and cached, so
//! field access never inspects the type at run time.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{DataSource, DeclaredRule, MapData};
use crate::engine::Validation;
use crate::error::DataError;
use crate::registry;
use crate::translator::Messages;
use crate::value::Kind;

/// Types that expose a field-descriptor table.
///
/// # Example
///
/// ```rust,ignore
/// use datagate::{Fields, Record};
///
/// #[derive(Serialize, Deserialize, Fields)]
/// struct User {
///     #[validate(rules = "required|minLen:7")]
///     name: String,
///     #[validate(rules = "int:1,99")]
///     age: u32,
/// }
///
/// impl Record for User {}
/// ```
pub trait Fields: Sized + 'static {
    /// Describe every field, in declaration order.
    fn fields() -> Vec<FieldDescriptor<Self>>;
}

/// Optional capabilities a record may offer to the engine.
///
/// Every method defaults to offering nothing.
pub trait Record: Fields + Send {
    /// Message templates keyed by `field` or `field.validator`.
    fn messages(&self) -> Option<Messages> {
        None
    }

    /// Display names keyed by field.
    fn translations(&self) -> Option<Messages> {
        None
    }

    /// Register extra rules, validators or settings on a new engine.
    fn configure(&self, _validation: &mut Validation) {}
}

/// Accessors into a nested record field.
pub struct NestedAccess<T> {
    pub get: fn(&T, &str) -> Option<Value>,
    pub set: fn(&mut T, &str, Value) -> Result<(), DataError>,
    pub kind_of: fn(&T, &str) -> Kind,
    pub rules: fn() -> Vec<DeclaredRule>,
}

/// One entry of a record's field table.
pub struct FieldDescriptor<T> {
    name: &'static str,
    kind: Kind,
    rules: Option<&'static str>,
    filters: Option<&'static str>,
    get: fn(&T) -> Value,
    set: Option<fn(&mut T, Value) -> Result<(), DataError>>,
    nested: Option<NestedAccess<T>>,
}

impl<T> FieldDescriptor<T> {
    /// A read-only field with the given getter.
    pub fn new(name: &'static str, get: fn(&T) -> Value) -> Self {
        Self {
            name,
            kind: Kind::Unknown,
            rules: None,
            filters: None,
            get,
            set: None,
            nested: None,
        }
    }

    /// Declare the field's kind.
    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Declare rule text for the field.
    pub fn rules(mut self, rules: &'static str) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Declare a filter chain for the field.
    pub fn filters(mut self, filters: &'static str) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Make the field writable.
    pub fn setter(mut self, set: fn(&mut T, Value) -> Result<(), DataError>) -> Self {
        self.set = Some(set);
        self
    }

    /// Mark the field as a nested record.
    pub fn nested(mut self, nested: NestedAccess<T>) -> Self {
        self.nested = Some(nested);
        self
    }

    /// Field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the field rejects writes.
    pub fn is_readonly(&self) -> bool {
        self.set.is_none()
    }
}

type TableCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static TABLES: OnceLock<TableCache> = OnceLock::new();

/// The cached field table of a record type.
pub fn table<T: Fields>() -> Arc<Vec<FieldDescriptor<T>>> {
    let cache = TABLES.get_or_init(Default::default);
    let id = TypeId::of::<T>();

    let cached = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned();
    if let Some(table) = cached.and_then(|any| any.downcast::<Vec<FieldDescriptor<T>>>().ok()) {
        return table;
    }

    let table = Arc::new(T::fields());
    trace_trace!(
        record = std::any::type_name::<T>(),
        fields = table.len(),
        "built field table"
    );
    let erased: Arc<dyn Any + Send + Sync> = table.clone();
    let stored = cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert(erased)
        .clone();
    stored.downcast().unwrap_or(table)
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn walk<'a>(mut current: &'a Value, path: &str) -> Option<&'a Value> {
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path on a record.
pub fn get_path<T: Fields>(record: &T, path: &str) -> Option<Value> {
    let (head, rest) = split_head(path);
    let table = table::<T>();
    let field = table.iter().find(|field| field.name == head)?;

    match (rest, &field.nested) {
        (None, _) => Some((field.get)(record)),
        (Some(rest), Some(nested)) => (nested.get)(record, rest),
        (Some(rest), None) => walk(&(field.get)(record), rest).cloned(),
    }
}

/// Write a value at a dotted path on a record.
pub fn set_path<T: Fields>(record: &mut T, path: &str, value: Value) -> Result<(), DataError> {
    let (head, rest) = split_head(path);
    let table = table::<T>();
    let field = table
        .iter()
        .find(|field| field.name == head)
        .ok_or_else(|| DataError::PathNotFound(path.to_string()))?;

    if let (Some(rest), Some(nested)) = (rest, &field.nested) {
        return (nested.set)(record, rest, value);
    }

    let set = field
        .set
        .ok_or_else(|| DataError::ReadOnly(path.to_string()))?;
    match rest {
        None => set(record, value),
        Some(rest) => {
            // Plain map-like field: rewrite the whole value.
            let map = match (field.get)(record) {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(DataError::TypeMismatch {
                        field: path.to_string(),
                        reason: format!("'{}' is a {}, not a map", head, Kind::of(&other)),
                    })
                }
            };
            let mut inner = MapData::new(map);
            inner.set(rest, value)?;
            set(record, Value::Object(inner.into_map()))
        }
    }
}

/// The kind at a dotted path, preferring the declared kind.
pub fn kind_of_path<T: Fields>(record: &T, path: &str) -> Kind {
    let (head, rest) = split_head(path);
    let table = table::<T>();
    let Some(field) = table.iter().find(|field| field.name == head) else {
        return Kind::Unknown;
    };

    match (rest, &field.nested) {
        (None, _) if field.kind != Kind::Unknown => field.kind,
        (None, _) => Kind::of(&(field.get)(record)),
        (Some(rest), Some(nested)) => (nested.kind_of)(record, rest),
        (Some(rest), None) => walk(&(field.get)(record), rest).map_or(Kind::Unknown, Kind::of),
    }
}

/// Rules declared on a record type, nested records prefixed by their field.
pub fn declared_rules<T: Fields>() -> Vec<DeclaredRule> {
    let mut declared = Vec::new();
    for field in table::<T>().iter() {
        if field.rules.is_some() || field.filters.is_some() {
            declared.push(DeclaredRule {
                field: field.name.to_string(),
                rules: field.rules.unwrap_or_default().to_string(),
                filters: field.filters.map(str::to_string),
            });
        }
        if let Some(nested) = &field.nested {
            declared.extend((nested.rules)().into_iter().map(|rule| DeclaredRule {
                field: format!("{}.{}", field.name, rule.field),
                ..rule
            }));
        }
    }
    declared
}

/// Field getter used by generated tables.
pub fn to_value<V: Serialize>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Field setter used by generated tables.
///
/// String input is retried as a coerced primitive, so `"10"` fits an integer
/// field.
pub fn assign<V: DeserializeOwned>(slot: &mut V, field: &str, value: Value) -> Result<(), DataError> {
    *slot = registry::convert(&value).map_err(|reason| DataError::TypeMismatch {
        field: field.to_string(),
        reason,
    })?;
    Ok(())
}

/// Data held in a typed record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructData<T> {
    record: T,
}

impl<T: Record> StructData<T> {
    /// Wrap a record.
    pub fn new(record: T) -> Self {
        Self { record }
    }

    /// The wrapped record.
    pub fn record(&self) -> &T {
        &self.record
    }

    /// The wrapped record, mutably.
    pub fn record_mut(&mut self) -> &mut T {
        &mut self.record
    }

    /// Consume into the record.
    pub fn into_inner(self) -> T {
        self.record
    }
}

impl<T: Record> DataSource for StructData<T> {
    fn get(&self, field: &str) -> Option<Value> {
        get_path(&self.record, field)
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), DataError> {
        set_path(&mut self.record, field, value)
    }

    fn kind_of(&self, field: &str) -> Kind {
        kind_of_path(&self.record, field)
    }

    fn field_names(&self) -> Vec<String> {
        table::<T>()
            .iter()
            .map(|field| field.name.to_string())
            .collect()
    }

    fn declared_rules(&self) -> Vec<DeclaredRule> {
        declared_rules::<T>()
    }

    fn messages(&self) -> Option<Messages> {
        self.record.messages()
    }

    fn translations(&self) -> Option<Messages> {
        self.record.translations()
    }

    fn configure(&self, validation: &mut Validation) {
        self.record.configure(validation);
    }

    fn as_any(&self) -> &dyn Any {
        &self.record
    }
}

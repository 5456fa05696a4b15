//! Map-backed and JSON-backed data.

use serde_json::{Map, Value};
use std::any::Any;

use super::DataSource;
use crate::error::DataError;
use crate::value::Kind;

/// Data held in a JSON object.
///
/// Paths walk nested objects by key and arrays by numeric index
/// (`items.0.name`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    map: Map<String, Value>,
    raw_json: Option<Vec<u8>>,
}

impl MapData {
    /// Wrap an existing map.
    pub fn new(map: Map<String, Value>) -> Self {
        Self {
            map,
            raw_json: None,
        }
    }

    /// Wrap a value, which must be a JSON object.
    pub fn from_value(value: Value) -> Result<Self, DataError> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            _ => Err(DataError::InvalidData),
        }
    }

    /// Decode a JSON object from text.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Self::from_json_bytes(json.as_bytes())
    }

    /// Decode a JSON object from bytes, keeping the bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, DataError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let mut data = Self::from_value(value)?;
        data.raw_json = Some(bytes.to_vec());
        Ok(data)
    }

    /// The original JSON bytes, when decoded from JSON.
    pub fn raw_json(&self) -> Option<&[u8]> {
        self.raw_json.as_deref()
    }

    /// The underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Consume into the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.map.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for MapData {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl DataSource for MapData {
    fn get(&self, field: &str) -> Option<Value> {
        self.lookup(field).cloned()
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), DataError> {
        let segments: Vec<&str> = field.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some((last, parents)) if !last.is_empty() => (*last, parents),
            _ => return Err(DataError::PathNotFound(field.to_string())),
        };

        let mut current = &mut self.map;
        for segment in parents {
            let next = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match next {
                Value::Object(map) => map,
                other => {
                    return Err(DataError::TypeMismatch {
                        field: field.to_string(),
                        reason: format!("'{}' is a {}, not a map", segment, Kind::of(other)),
                    })
                }
            };
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    fn kind_of(&self, field: &str) -> Kind {
        self.lookup(field).map_or(Kind::Unknown, Kind::of)
    }

    fn field_names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Form-backed data: query strings, urlencoded and multipart bodies.

use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;

use super::DataSource;
use crate::error::DataError;
use crate::value::Kind;

/// An uploaded file from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    field: String,
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    /// Create a new uploaded file
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type,
            data: data.into(),
        }
    }

    /// Form field the file was posted under
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Original file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Declared content type
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// File contents
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Media type without parameters, lowercased (`image/png`).
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty())
    }
}

/// Multi-valued string data with optional file uploads.
///
/// A field with one value reads as a string, with several as an array of
/// strings. Files are kept apart from values and reached only through
/// [`DataSource::file`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    values: IndexMap<String, Vec<String>>,
    typed: IndexMap<String, Value>,
    files: IndexMap<String, UploadedFile>,
}

impl FormData {
    /// Create empty form data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs; repeated keys accumulate.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut data = Self::new();
        data.add_values(pairs);
        data
    }

    /// Decode an urlencoded string (`a=1&b=2&b=3`).
    pub fn from_query(query: &str) -> Result<Self, DataError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| DataError::Body(format!("malformed urlencoded data: {}", e)))?;
        Ok(Self::from_pairs(pairs))
    }

    /// Append a value to a field.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.typed.shift_remove(&key);
        self.values.entry(key).or_default().push(value.into());
    }

    /// Append many values, e.g. query parameters after body fields.
    pub fn add_values<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.add(key, value);
        }
    }

    /// Attach an uploaded file.
    pub fn add_file(&mut self, file: UploadedFile) {
        self.files.insert(file.field.clone(), file);
    }

    /// Attach many uploaded files.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = UploadedFile>) {
        for file in files {
            self.add_file(file);
        }
    }

    /// Raw string values of a field.
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Names of uploaded file fields.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Check whether a field has a value or file.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.typed.contains_key(key) || self.files.contains_key(key)
    }
}

impl DataSource for FormData {
    fn get(&self, field: &str) -> Option<Value> {
        if let Some(value) = self.typed.get(field) {
            return Some(value.clone());
        }
        match self.values.get(field)?.as_slice() {
            [] => None,
            [single] => Some(Value::String(single.clone())),
            many => Some(Value::Array(
                many.iter().cloned().map(Value::String).collect(),
            )),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), DataError> {
        match value {
            Value::String(s) => {
                self.typed.shift_remove(field);
                self.values.insert(field.to_string(), vec![s]);
            }
            Value::Array(items) if items.iter().all(Value::is_string) => {
                self.typed.shift_remove(field);
                let strings = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                self.values.insert(field.to_string(), strings);
            }
            other => {
                // Coerced values keep their type; the key stays listed.
                self.values.entry(field.to_string()).or_default();
                self.typed.insert(field.to_string(), other);
            }
        }
        Ok(())
    }

    fn kind_of(&self, field: &str) -> Kind {
        self.get(field).map_or(Kind::Unknown, |value| Kind::of(&value))
    }

    fn field_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_and_multi_values() {
        let data = FormData::from_pairs([("name", "inhere"), ("tag", "a"), ("tag", "b")]);
        assert_eq!(data.get("name"), Some(json!("inhere")));
        assert_eq!(data.get("tag"), Some(json!(["a", "b"])));
        assert_eq!(data.get("missing"), None);
        assert_eq!(data.field_names(), vec!["name", "tag"]);
    }

    #[test]
    fn query_string_decoding() {
        let data = FormData::from_query("age=10&name=in%20here").unwrap();
        assert_eq!(data.get("age"), Some(json!("10")));
        assert_eq!(data.get("name"), Some(json!("in here")));
    }

    #[test]
    fn typed_values_override_strings() {
        let mut data = FormData::from_pairs([("age", "10")]);
        data.set("age", json!(10)).unwrap();
        assert_eq!(data.get("age"), Some(json!(10)));
        assert_eq!(data.kind_of("age"), Kind::Int);

        data.set("age", json!("11")).unwrap();
        assert_eq!(data.get("age"), Some(json!("11")));
    }

    #[test]
    fn files_are_a_separate_namespace() {
        let mut data = FormData::from_pairs([("title", "x")]);
        data.add_file(UploadedFile::new(
            "avatar",
            "me.png",
            Some("image/PNG; q=1".to_string()),
            Bytes::from_static(b"\x89PNG"),
        ));

        assert_eq!(data.get("avatar"), None);
        let file = data.file("avatar").unwrap();
        assert_eq!(file.file_name(), "me.png");
        assert_eq!(file.mime_type().as_deref(), Some("image/png"));
        assert_eq!(file.size(), 4);
        assert!(data.has("avatar"));
    }
}

//! Field display names and message templates.
//!
//! Templates use `{field}` for the field's display name, `{arg0}`..`{argN}`
//! for rule arguments and `{args}` for all arguments joined by `, `.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::value;

/// String-to-string map used for messages and display names.
pub type Messages = HashMap<String, String>;

/// Key of the fallback template.
pub const FALLBACK_KEY: &str = "_";

/// Key of the template used when a filter fails.
pub const FILTER_KEY: &str = "_filter";

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (FALLBACK_KEY, "{field} did not pass validate"),
    (FILTER_KEY, "{field} could not be filtered: {arg0}"),
    ("required", "{field} is required and not empty"),
    // types
    ("string", "{field} value must be a string"),
    ("string1", "{field} value must be a string and min length is {arg0}"),
    ("string2", "{field} value must be a string and length must be in the range {arg0} - {arg1}"),
    ("int", "{field} value must be an integer"),
    ("int1", "{field} value must be an integer and min value is {arg0}"),
    ("int2", "{field} value must be an integer and in the range {arg0} - {arg1}"),
    ("uint", "{field} value must be an unsigned integer(>= 0)"),
    ("float", "{field} value must be a float"),
    ("bool", "{field} value must be a bool"),
    ("number", "{field} value must be a number"),
    ("array", "{field} value must be an array"),
    ("map", "{field} value must be a map"),
    // formats
    ("email", "{field} value is an invalid email address"),
    ("url", "{field} value is an invalid URL address"),
    ("ip", "{field} value is an invalid IP address"),
    ("alpha", "{field} value may only contain letters"),
    ("alphaNum", "{field} value may only contain letters and numbers"),
    ("alphaDash", "{field} value may only contain letters, numbers, dashes and underscores"),
    ("regexp", "{field} value does not match the pattern {arg0}"),
    // bounds
    ("min", "{field} min value is {arg0}"),
    ("max", "{field} max value is {arg0}"),
    ("range", "{field} value must be in the range {arg0} - {arg1}"),
    ("lt", "{field} value should be less than {arg0}"),
    ("gt", "{field} value should be greater than {arg0}"),
    ("len", "{field} length must be {arg0}"),
    ("minLen", "{field} min length is {arg0}"),
    ("maxLen", "{field} max length is {arg0}"),
    // membership
    ("enum", "{field} value must be in the enum [{args}]"),
    ("notIn", "{field} value must not be in the enum [{args}]"),
    ("contains", "{field} value does not contain {arg0}"),
    ("startsWith", "{field} value does not start with {arg0}"),
    ("endsWith", "{field} value does not end with {arg0}"),
    // cross-field
    ("eqField", "{field} value must be equal to the field {arg0}"),
    ("neField", "{field} value cannot be equal to the field {arg0}"),
    ("gtField", "{field} value must be greater than the field {arg0}"),
    ("gteField", "{field} value should be greater or equal to the field {arg0}"),
    ("ltField", "{field} value should be less than the field {arg0}"),
    ("lteField", "{field} value should be less than or equal to the field {arg0}"),
    // uploads
    ("isFile", "{field} must be an uploaded file"),
    ("isImage", "{field} must be an uploaded image file"),
    ("inMimeTypes", "{field} file type should be one of [{args}]"),
];

static DEFAULTS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

/// The library-wide default template for a key.
pub fn default_message(key: &str) -> Option<&'static str> {
    DEFAULTS
        .get_or_init(|| DEFAULT_MESSAGES.iter().copied().collect())
        .get(key)
        .copied()
}

/// Substitute placeholders in a template.
pub fn render(template: &str, field: &str, args: &[Value]) -> String {
    let mut message = template.replace("{field}", field);
    if message.contains("{args}") {
        let all = args.iter().map(value::display).collect::<Vec<_>>().join(", ");
        message = message.replace("{args}", &all);
    }
    // Highest index first so `{arg1}` never clobbers `{arg10}`.
    for (i, arg) in args.iter().enumerate().rev() {
        let placeholder = format!("{{arg{}}}", i);
        if message.contains(&placeholder) {
            message = message.replace(&placeholder, &value::display(arg));
        }
    }
    message
}

/// Resolves field display names and validator messages.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    fields: Messages,
    messages: Messages,
}

impl Translator {
    /// Create a translator with no custom entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add field display names.
    pub fn add_field_map<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Add message templates keyed by `validator` or `field.validator`.
    pub fn add_messages<K, V>(&mut self, messages: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.messages
            .extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Check whether a field has a display name.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Check whether a custom message exists for a key.
    pub fn has_message(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    /// The display name of a field, or the field itself.
    pub fn field_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields.get(field).map_or(field, String::as_str)
    }

    /// Find the template for a validator failure on a field.
    ///
    /// Lookup order: custom `field.validator`, custom `validator`, default
    /// `validator<arg count>`, default `validator`, the fallback template.
    pub fn template(&self, validator: &str, field: &str, arg_count: usize) -> &str {
        if let Some(message) = self.messages.get(&format!("{}.{}", field, validator)) {
            return message;
        }
        if let Some(message) = self.messages.get(validator) {
            return message;
        }
        default_message(&format!("{}{}", validator, arg_count))
            .or_else(|| default_message(validator))
            .or_else(|| self.messages.get(FALLBACK_KEY).map(String::as_str))
            .or_else(|| default_message(FALLBACK_KEY))
            .unwrap_or_default()
    }

    /// Format the message for a validator failure on a field.
    pub fn message(&self, validator: &str, field: &str, args: &[Value]) -> String {
        render(
            self.template(validator, field, args.len()),
            self.field_name(field),
            args,
        )
    }
}

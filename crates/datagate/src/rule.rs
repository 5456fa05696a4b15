//! The rule model: one validator applied to one or more fields.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::engine::Validation;
use crate::error::{ConfigError, FilterError};
use crate::filters::FilterFn;
use crate::registry::{CheckFunc, IntoCheckFunc};
use crate::translator::{Messages, Translator};

/// Validator name that opts a field out of validation.
pub const EXCLUDE: &str = "-";

/// Hook deciding whether a rule runs for a field.
pub type BeforeFn = Arc<dyn Fn(&str, &Validation) -> bool + Send + Sync>;

/// Conversion into rule arguments.
///
/// Implemented for `()`, arrays, tuples of up to three values and
/// `Vec<Value>`.
pub trait IntoArgs {
    fn into_args(self) -> Vec<Value>;
}

impl IntoArgs for () {
    fn into_args(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Vec<Value> {
        self
    }
}

impl<T: Into<Value>, const N: usize> IntoArgs for [T; N] {
    fn into_args(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<A: Into<Value>> IntoArgs for (A,) {
    fn into_args(self) -> Vec<Value> {
        vec![self.0.into()]
    }
}

impl<A: Into<Value>, B: Into<Value>> IntoArgs for (A, B) {
    fn into_args(self) -> Vec<Value> {
        vec![self.0.into(), self.1.into()]
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> IntoArgs for (A, B, C) {
    fn into_args(self) -> Vec<Value> {
        vec![self.0.into(), self.1.into(), self.2.into()]
    }
}

/// Split a comma-separated field list, dropping blanks.
pub(crate) fn split_fields(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

/// One validation directive.
///
/// Setters mutate in place and return the rule for chaining:
///
/// ```rust,ignore
/// v.add_rule("name,email", "required", ())
///     .set_scene("create")
///     .set_messages([("email", "we need your email")]);
/// ```
#[derive(Clone)]
pub struct Rule {
    fields: Vec<String>,
    validator: String,
    args: Vec<Value>,
    scene: Option<String>,
    optional: bool,
    skip_empty: Option<bool>,
    message: Option<String>,
    messages: Messages,
    before: Option<BeforeFn>,
    filter: Option<FilterFn>,
    check: Option<CheckFunc>,
}

impl Rule {
    /// Create a rule for comma-separated `fields`.
    pub fn new(fields: &str, validator: impl Into<String>, args: impl IntoArgs) -> Self {
        Self {
            fields: split_fields(fields),
            validator: validator.into(),
            args: args.into_args(),
            scene: None,
            optional: false,
            skip_empty: None,
            message: None,
            messages: Messages::new(),
            before: None,
            filter: None,
            check: None,
        }
    }

    /// Restrict the rule to one scene.
    pub fn set_scene(&mut self, scene: impl Into<String>) -> &mut Self {
        self.scene = Some(scene.into());
        self
    }

    /// Only validate when the field is present.
    pub fn set_optional(&mut self, optional: bool) -> &mut Self {
        self.optional = optional;
        self
    }

    /// Skip absent or empty values, overriding the engine policy.
    pub fn set_skip_empty(&mut self, skip_empty: bool) -> &mut Self {
        self.skip_empty = Some(skip_empty);
        self
    }

    /// Use one message for every failure of this rule.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    /// Messages keyed by `field` or `field.validator`.
    pub fn set_messages<K, V>(&mut self, messages: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.messages = messages
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Gate the rule per field; returning `false` skips it without error.
    pub fn set_before_func<F>(&mut self, before: F) -> &mut Self
    where
        F: Fn(&str, &Validation) -> bool + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(before));
        self
    }

    /// Transform the field's value before validating; the result is written back.
    pub fn set_filter_func<F>(&mut self, filter: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Use a typed closure as this rule's validator.
    ///
    /// # Panics
    ///
    /// Panics when the closure takes a different number of rule arguments
    /// than the rule carries. Use [`Rule::try_set_check_func`] to handle the
    /// mismatch instead.
    pub fn set_check_func<F, M>(&mut self, check: F) -> &mut Self
    where
        F: IntoCheckFunc<M>,
    {
        if let Err(err) = self.try_set_check_func(check) {
            panic!("{}", err);
        }
        self
    }

    /// Use a typed closure as this rule's validator, checking its arity.
    pub fn try_set_check_func<F, M>(&mut self, check: F) -> Result<&mut Self, ConfigError>
    where
        F: IntoCheckFunc<M>,
    {
        let name = if self.validator.is_empty() {
            format!("rule_{}", self.fields.join("_"))
        } else {
            format!("rule_{}", self.validator)
        };
        let check = CheckFunc::new(name, check);
        check.arity().check(check.name(), self.args.len())?;
        self.check = Some(check);
        Ok(self)
    }

    /// Target fields.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Validator name as declared.
    pub fn validator(&self) -> &str {
        &self.validator
    }

    /// Rule arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Scene restriction, if any.
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Explicit skip-empty choice, if set.
    pub fn skip_empty(&self) -> Option<bool> {
        self.skip_empty
    }

    /// Whether this rule opts its fields out of validation.
    pub fn is_exclusion(&self) -> bool {
        self.validator == EXCLUDE
    }

    pub(crate) fn before(&self) -> Option<&BeforeFn> {
        self.before.as_ref()
    }

    pub(crate) fn filter(&self) -> Option<&FilterFn> {
        self.filter.as_ref()
    }

    pub(crate) fn check(&self) -> Option<&CheckFunc> {
        self.check.as_ref()
    }

    /// Resolve the failure message for a field.
    ///
    /// Rule messages win (`field.validator`, then `field`), then the rule's
    /// single message, then the translator. `canonical` is the registry name
    /// of the validator and `args` the arguments as they should be displayed.
    pub(crate) fn error_message(
        &self,
        field: &str,
        canonical: &str,
        translator: &Translator,
        args: &[Value],
    ) -> String {
        let keyed = [
            format!("{}.{}", field, self.validator),
            format!("{}.{}", field, canonical),
            field.to_string(),
        ];
        if let Some(message) = keyed.iter().find_map(|key| self.messages.get(key)) {
            return message.clone();
        }
        if let Some(message) = &self.message {
            return message.clone();
        }
        translator.message(canonical, field, args)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("fields", &self.fields)
            .field("validator", &self.validator)
            .field("args", &self.args)
            .field("scene", &self.scene)
            .field("optional", &self.optional)
            .field("skip_empty", &self.skip_empty)
            .field("has_before", &self.before.is_some())
            .field("has_filter", &self.filter.is_some())
            .field("check", &self.check)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_are_comma_split_in_order() {
        let rule = Rule::new("name, email,,age", "required", ());
        assert_eq!(rule.fields(), ["name", "email", "age"]);
        assert!(rule.args().is_empty());
    }

    #[test]
    fn args_conversions() {
        assert_eq!(Rule::new("a", "range", (1, 99)).args(), [json!(1), json!(99)]);
        assert_eq!(Rule::new("a", "minLen", [7]).args(), [json!(7)]);
        assert_eq!(
            Rule::new("a", "enum", vec![json!(["x", "y"])]).args(),
            [json!(["x", "y"])]
        );
        assert_eq!(Rule::new("a", "x", ("s", true, 1.5)).args().len(), 3);
    }

    #[test]
    fn chained_setters() {
        let mut rule = Rule::new("name", "required", ());
        rule.set_scene("create")
            .set_optional(true)
            .set_skip_empty(false)
            .set_message("need a name");

        assert_eq!(rule.scene(), Some("create"));
        assert!(rule.is_optional());
        assert_eq!(rule.skip_empty(), Some(false));
    }

    #[test]
    fn message_precedence() {
        let trans = Translator::new();
        let mut rule = Rule::new("name,email", "minLen", [7]);
        assert_eq!(
            rule.error_message("name", "minLen", &trans, rule.args()),
            "name min length is 7"
        );

        rule.set_message("too short");
        assert_eq!(rule.error_message("name", "minLen", &trans, rule.args()), "too short");

        rule.set_messages([("name", "bad name"), ("email.minLen", "short email")]);
        assert_eq!(rule.error_message("name", "minLen", &trans, rule.args()), "bad name");
        assert_eq!(rule.error_message("email", "minLen", &trans, rule.args()), "short email");
    }

    #[test]
    fn check_func_arity_is_checked_on_registration() {
        let mut rule = Rule::new("code", "code", ());
        assert!(rule.try_set_check_func(|v: String| v.len() == 4).is_ok());

        let mut rule = Rule::new("code", "code", [4]);
        let err = rule.try_set_check_func(|v: String| v.len() == 4).unwrap_err();
        assert!(matches!(err, ConfigError::Arity { got: 1, .. }));
    }

    #[test]
    #[should_panic(expected = "expects 1 argument(s), got 0")]
    fn set_check_func_panics_on_mismatch() {
        let mut rule = Rule::new("age", "divisible", ());
        rule.set_check_func(|v: i64, by: i64| v % by == 0);
    }

    #[test]
    fn exclusion_marker() {
        assert!(Rule::new("safe", EXCLUDE, ()).is_exclusion());
    }
}

//! Validator registry: built-in validators and typed custom checks.
//!
//! Validators are looked up by name. Every entry declares how many rule
//! arguments it accepts, so a misconfigured rule fails when it is registered
//! (or at the latest when it is dispatched) instead of silently passing.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::data::UploadedFile;
use crate::error::ConfigError;
use crate::validators;
use crate::value;

/// Number of arguments a validator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Minimum argument count (inclusive)
    pub min: usize,
    /// Maximum argument count (inclusive), `None` for unbounded
    pub max: Option<usize>,
}

impl Arity {
    /// Exactly `n` arguments.
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    /// Between `min` and `max` arguments.
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// At least `n` arguments.
    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    /// Check whether `count` arguments are acceptable.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub(crate) fn check(&self, validator: &str, count: usize) -> Result<(), ConfigError> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(ConfigError::Arity {
                validator: validator.to_string(),
                expected: *self,
                got: count,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// The function behind a built-in validator, tagged by what it inspects.
#[derive(Clone, Copy)]
pub enum ValidatorFn {
    /// Checks the field's value against the rule arguments.
    Value(fn(&Value, &[Value]) -> bool),
    /// Compares the field's value with another field named by the first argument.
    Field(fn(&Value, &Value) -> bool),
    /// Checks an uploaded file against the rule arguments.
    File(fn(&UploadedFile, &[Value]) -> bool),
}

impl fmt::Debug for ValidatorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorFn::Value(_) => f.write_str("ValidatorFn::Value"),
            ValidatorFn::Field(_) => f.write_str("ValidatorFn::Field"),
            ValidatorFn::File(_) => f.write_str("ValidatorFn::File"),
        }
    }
}

/// A built-in validator entry.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    /// Canonical name
    pub name: &'static str,
    /// Accepted argument count
    pub arity: Arity,
    /// Runs even when the value is absent or empty and the rule would skip it
    pub empty_aware: bool,
    /// The check itself
    pub func: ValidatorFn,
}

impl Validator {
    pub(crate) const fn value(
        name: &'static str,
        arity: Arity,
        func: fn(&Value, &[Value]) -> bool,
    ) -> Self {
        Self {
            name,
            arity,
            empty_aware: false,
            func: ValidatorFn::Value(func),
        }
    }

    pub(crate) const fn field(name: &'static str, func: fn(&Value, &Value) -> bool) -> Self {
        Self {
            name,
            arity: Arity::exactly(1),
            empty_aware: false,
            func: ValidatorFn::Field(func),
        }
    }

    pub(crate) const fn file(
        name: &'static str,
        arity: Arity,
        func: fn(&UploadedFile, &[Value]) -> bool,
    ) -> Self {
        Self {
            name,
            arity,
            empty_aware: false,
            func: ValidatorFn::File(func),
        }
    }

    pub(crate) const fn empty_aware(mut self) -> Self {
        self.empty_aware = true;
        self
    }
}

static BUILTINS: OnceLock<HashMap<&'static str, Validator>> = OnceLock::new();

/// Alternate spellings accepted for built-in validators.
const ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("isInt", "int"),
    ("isUint", "uint"),
    ("isFloat", "float"),
    ("isBool", "bool"),
    ("boolean", "bool"),
    ("isString", "string"),
    ("isNumber", "number"),
    ("isArray", "array"),
    ("isSlice", "array"),
    ("isMap", "map"),
    ("isEmail", "email"),
    ("isURL", "url"),
    ("isIP", "ip"),
    ("between", "range"),
    ("regex", "regexp"),
    ("in", "enum"),
    ("not_in", "notIn"),
    ("length", "len"),
    ("minLength", "minLen"),
    ("maxLength", "maxLen"),
    ("lessThan", "lt"),
    ("greaterThan", "gt"),
    ("eq_field", "eqField"),
    ("ne_field", "neField"),
    ("gt_field", "gtField"),
    ("gte_field", "gteField"),
    ("lt_field", "ltField"),
    ("lte_field", "lteField"),
    ("file", "isFile"),
    ("image", "isImage"),
    ("mimeTypes", "inMimeTypes"),
];

/// Resolve an alias to the canonical validator name.
pub fn validator_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Look up a built-in validator by name or alias.
pub fn builtin(name: &str) -> Option<&'static Validator> {
    BUILTINS
        .get_or_init(|| {
            validators::BUILTIN
                .iter()
                .map(|validator| (validator.name, *validator))
                .collect()
        })
        .get(validator_name(name))
}

type CheckFnBox = Arc<dyn Fn(&Value, &[Value]) -> Result<bool, String> + Send + Sync>;

/// A user-supplied validator with a checked signature.
///
/// The first parameter of the wrapped closure receives the field value; any
/// further parameters receive rule arguments, so the closure's parameter
/// count fixes the validator's arity.
#[derive(Clone)]
pub struct CheckFunc {
    name: String,
    arity: Arity,
    func: CheckFnBox,
}

impl CheckFunc {
    /// Wrap a typed closure.
    pub fn new<F, M>(name: impl Into<String>, func: F) -> Self
    where
        F: IntoCheckFunc<M>,
    {
        let (arity, func) = func.into_parts();
        Self {
            name: name.into(),
            arity,
            func,
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rule arguments the check takes.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Run the check.
    ///
    /// A value or argument that does not convert to the declared parameter
    /// type fails the check with the conversion error.
    pub fn call(&self, value: &Value, args: &[Value]) -> Result<bool, String> {
        (self.func)(value, args)
    }
}

impl fmt::Debug for CheckFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckFunc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Result types a custom check may return.
pub trait CheckOutput {
    /// Normalize into pass/fail or an error message.
    fn into_outcome(self) -> Result<bool, String>;
}

impl CheckOutput for bool {
    fn into_outcome(self) -> Result<bool, String> {
        Ok(self)
    }
}

impl<E: fmt::Display> CheckOutput for Result<bool, E> {
    fn into_outcome(self) -> Result<bool, String> {
        self.map_err(|e| e.to_string())
    }
}

/// Closures usable as custom checks.
///
/// Implemented for `Fn(T) -> O`, `Fn(T, A) -> O` and `Fn(T, A, B) -> O`
/// where every parameter deserializes from a [`Value`] and `O` is `bool`
/// or `Result<bool, E>`.
pub trait IntoCheckFunc<M>: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_parts(self) -> (Arity, CheckFnBox);
}

/// Deserialize a parameter, retrying string input as a coerced primitive.
pub(crate) fn convert<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Ok(v),
        Err(err) => match value {
            Value::String(s) => serde_json::from_value(value::coerce_str_lossy(s))
                .map_err(|_| err.to_string()),
            _ => Err(err.to_string()),
        },
    }
}

impl<F, T, O> IntoCheckFunc<(O, T)> for F
where
    F: Fn(T) -> O + Send + Sync + 'static,
    T: DeserializeOwned,
    O: CheckOutput,
{
    fn into_parts(self) -> (Arity, CheckFnBox) {
        let f = self;
        let func: CheckFnBox = Arc::new(move |value: &Value, _args: &[Value]| {
            f(convert(value)?).into_outcome()
        });
        (Arity::exactly(0), func)
    }
}

impl<F, T, A, O> IntoCheckFunc<(O, T, A)> for F
where
    F: Fn(T, A) -> O + Send + Sync + 'static,
    T: DeserializeOwned,
    A: DeserializeOwned,
    O: CheckOutput,
{
    fn into_parts(self) -> (Arity, CheckFnBox) {
        let f = self;
        let func: CheckFnBox = Arc::new(move |value: &Value, args: &[Value]| {
            let a = args.first().ok_or("missing argument 1")?;
            f(convert(value)?, convert(a)?).into_outcome()
        });
        (Arity::exactly(1), func)
    }
}

impl<F, T, A, B, O> IntoCheckFunc<(O, T, A, B)> for F
where
    F: Fn(T, A, B) -> O + Send + Sync + 'static,
    T: DeserializeOwned,
    A: DeserializeOwned,
    B: DeserializeOwned,
    O: CheckOutput,
{
    fn into_parts(self) -> (Arity, CheckFnBox) {
        let f = self;
        let func: CheckFnBox = Arc::new(move |value: &Value, args: &[Value]| {
            let a = args.first().ok_or("missing argument 1")?;
            let b = args.get(1).ok_or("missing argument 2")?;
            f(convert(value)?, convert(a)?, convert(b)?).into_outcome()
        });
        (Arity::exactly(2), func)
    }
}

/// A validator resolved for dispatch.
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Builtin(&'static Validator),
    Custom(&'a CheckFunc),
}

impl Resolved<'_> {
    /// Canonical name used for messages.
    pub fn name(&self) -> &str {
        match self {
            Resolved::Builtin(v) => v.name,
            Resolved::Custom(c) => c.name(),
        }
    }

    /// Accepted argument count.
    pub fn arity(&self) -> Arity {
        match self {
            Resolved::Builtin(v) => v.arity,
            Resolved::Custom(c) => c.arity(),
        }
    }

    /// Whether the validator runs on absent/empty values regardless of skip policy.
    pub fn empty_aware(&self) -> bool {
        matches!(self, Resolved::Builtin(v) if v.empty_aware)
    }

    /// Whether the validator compares against another field.
    pub fn is_cross_field(&self) -> bool {
        matches!(self, Resolved::Builtin(v) if matches!(v.func, ValidatorFn::Field(_)))
    }
}

/// Per-engine custom validators layered over the built-in table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    custom: HashMap<String, CheckFunc>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom validator, replacing any earlier one with that name.
    pub fn add(&mut self, check: CheckFunc) {
        self.custom.insert(check.name().to_string(), check);
    }

    /// Check whether a custom validator is registered.
    pub fn has_custom(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    /// Resolve a name. Custom validators shadow built-ins.
    pub fn resolve(&self, name: &str) -> Option<Resolved<'_>> {
        if let Some(check) = self.custom.get(name) {
            return Some(Resolved::Custom(check));
        }
        builtin(name).map(Resolved::Builtin)
    }
}

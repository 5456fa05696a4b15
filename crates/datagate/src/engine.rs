//! The validation engine.
//!
//! A [`Validation`] owns one data source, the rules declared against it and
//! the result of running them. A run goes through these steps:
//!
//! 1. inject defaults for absent or empty fields
//! 2. apply filter rules, writing results back into the data
//! 3. evaluate rules in declaration order, field by field
//! 4. on success, copy every validated field into the safe data
//!
//! Field errors accumulate in [`Errors`]; configuration mistakes (unknown
//! validators, arity mismatches, unknown filters) abort the run with a
//! [`ConfigError`].

use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::mem;

use crate::config::global_options;
use crate::data::{DataSource, UploadedFile};
use crate::error::{ConfigError, DataError, Errors, FilterError, DATA_ERROR_KEY};
use crate::filters::{self, Filters};
use crate::parser::{self, Directive};
use crate::registry::{Arity, CheckFunc, IntoCheckFunc, Registry, Resolved, ValidatorFn};
use crate::rule::{split_fields, IntoArgs, Rule};
use crate::translator::{Translator, FILTER_KEY};
use crate::value;

/// Where an engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not run yet, or reset
    Unvalidated,
    Passed,
    Failed,
}

#[derive(Debug, Clone)]
struct FilterRule {
    fields: Vec<String>,
    chain: Vec<String>,
}

/// A validator ready to call.
enum Call {
    Builtin(ValidatorFn),
    Check(CheckFunc),
}

struct Target {
    name: String,
    arity: Arity,
    empty_aware: bool,
    cross_field: bool,
    call: Call,
}

impl Target {
    fn check(name: &str, check: CheckFunc) -> Self {
        Self {
            name: name.to_string(),
            arity: check.arity(),
            empty_aware: false,
            cross_field: false,
            call: Call::Check(check),
        }
    }

    fn resolved(resolved: Resolved<'_>) -> Self {
        let name = resolved.name().to_string();
        let arity = resolved.arity();
        let empty_aware = resolved.empty_aware();
        let cross_field = resolved.is_cross_field();
        let call = match resolved {
            Resolved::Builtin(validator) => Call::Builtin(validator.func),
            Resolved::Custom(check) => Call::Check(check.clone()),
        };
        Self {
            name,
            arity,
            empty_aware,
            cross_field,
            call,
        }
    }

    fn reads_files(&self) -> bool {
        matches!(self.call, Call::Builtin(ValidatorFn::File(_)))
    }
}

enum Input {
    Value(Value),
    File(UploadedFile),
}

enum Flow {
    Continue,
    Stop,
}

/// One validation run context over a data source.
///
/// # Example
///
/// ```rust,ignore
/// let mut v = datagate::json(r#"{"name": "inhere", "age": 100}"#);
/// v.string_rules([("name", "required|minLen:7"), ("age", "int|range:1,99")]);
///
/// if !v.validate() {
///     println!("{}", v.errors());
/// }
/// ```
pub struct Validation {
    data: Option<Box<dyn DataSource>>,
    init_error: Option<String>,
    rules: Vec<Rule>,
    filter_rules: Vec<FilterRule>,
    defaults: IndexMap<String, Value>,
    scene: Option<String>,
    scenes: IndexMap<String, Vec<String>>,
    stop_on_error: bool,
    skip_on_empty: bool,
    errors: Errors,
    safe_data: IndexMap<String, Value>,
    translator: Translator,
    registry: Registry,
    filters: Filters,
    state: State,
}

impl Validation {
    fn empty() -> Self {
        let options = global_options();
        Self {
            data: None,
            init_error: None,
            rules: Vec::new(),
            filter_rules: Vec::new(),
            defaults: IndexMap::new(),
            scene: None,
            scenes: IndexMap::new(),
            stop_on_error: options.stop_on_error,
            skip_on_empty: options.skip_on_empty,
            errors: Errors::new(),
            safe_data: IndexMap::new(),
            translator: Translator::new(),
            registry: Registry::new(),
            filters: Filters::new(),
            state: State::Unvalidated,
        }
    }

    /// Create an engine over a data source.
    pub fn new(data: impl DataSource) -> Self {
        Self::from_boxed(Box::new(data))
    }

    /// Create an engine over a boxed data source.
    ///
    /// The source's translations, messages and declared rules are loaded,
    /// then its `configure` hook runs.
    pub fn from_boxed(data: Box<dyn DataSource>) -> Self {
        let mut validation = Self::empty();

        if let Some(fields) = data.translations() {
            validation.translator.add_field_map(fields);
        }
        if let Some(messages) = data.messages() {
            validation.translator.add_messages(messages);
        }
        for declared in data.declared_rules() {
            match &declared.filters {
                Some(chain) => {
                    validation.string_rule_with_filter(&declared.field, &declared.rules, chain)
                }
                None => validation.string_rule(&declared.field, &declared.rules),
            };
        }
        data.configure(&mut validation);

        validation.data = Some(data);
        validation
    }

    /// Create an engine from a construction result.
    pub fn from_result<D: DataSource>(result: Result<D, DataError>) -> Self {
        match result {
            Ok(data) => Self::new(data),
            Err(err) => Self::from_error(err),
        }
    }

    /// Create an engine that fails with a construction error.
    ///
    /// The error is reported under [`DATA_ERROR_KEY`] and no rule runs.
    pub fn from_error(err: DataError) -> Self {
        trace_debug!(error = %err, "engine created without data");
        let mut validation = Self::empty();
        let message = err.to_string();
        validation.errors.add(DATA_ERROR_KEY, message.clone());
        validation.init_error = Some(message);
        validation
    }

    // ---- settings ----------------------------------------------------

    /// Select the scene used by the next run.
    pub fn set_scene(&mut self, scene: impl Into<String>) -> &mut Self {
        self.scene = Some(scene.into());
        self
    }

    /// The selected scene.
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// Declare which fields each scene validates.
    ///
    /// ```rust,ignore
    /// v.with_scenes([("create", vec!["name", "age"]), ("update", vec!["name"])]);
    /// ```
    pub fn with_scenes<S, I, F>(&mut self, scenes: impl IntoIterator<Item = (S, I)>) -> &mut Self
    where
        S: Into<String>,
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        for (scene, fields) in scenes {
            self.scenes
                .insert(scene.into(), fields.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Fields of a scene, if declared.
    pub fn scene_fields(&self, scene: &str) -> Option<&[String]> {
        self.scenes.get(scene).map(Vec::as_slice)
    }

    /// Stop at the first failing field (default from global options).
    pub fn set_stop_on_error(&mut self, stop: bool) -> &mut Self {
        self.stop_on_error = stop;
        self
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    /// Skip absent or empty values for rules without their own choice.
    pub fn set_skip_on_empty(&mut self, skip: bool) -> &mut Self {
        self.skip_on_empty = skip;
        self
    }

    pub fn skip_on_empty(&self) -> bool {
        self.skip_on_empty
    }

    // ---- rules -------------------------------------------------------

    /// Add a rule for comma-separated `fields`.
    ///
    /// ```rust,ignore
    /// v.add_rule("name", "minLen", [7]);
    /// v.add_rule("age", "range", (1, 99)).set_message("bad age");
    /// ```
    pub fn add_rule(&mut self, fields: &str, validator: &str, args: impl IntoArgs) -> &mut Rule {
        self.append_rule(Rule::new(fields, validator, args))
    }

    /// Append a prepared rule.
    pub fn append_rule(&mut self, rule: Rule) -> &mut Rule {
        if rule.fields().is_empty() {
            trace_warn!(validator = rule.validator(), "rule has no fields and will never run");
        }
        let index = self.rules.len();
        self.rules.push(rule);
        &mut self.rules[index]
    }

    /// Add rules for a field from rule text, e.g. `required|int:1,5`.
    pub fn string_rule(&mut self, field: &str, rule: &str) -> &mut Self {
        for directive in parser::parse(rule) {
            match directive {
                Directive::Default(value) => {
                    self.set_default(field, value);
                }
                Directive::Validate { validator, args } => {
                    self.add_rule(field, &validator, args);
                }
            }
        }
        self
    }

    /// Like [`Validation::string_rule`], also filtering the field first.
    pub fn string_rule_with_filter(&mut self, field: &str, rule: &str, filter: &str) -> &mut Self {
        self.string_rule(field, rule);
        self.filter_rule(field, filter)
    }

    /// Add rule text for many fields, in the given order.
    pub fn string_rules<K, V>(&mut self, rules: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (field, rule) in rules {
            self.string_rule(field.as_ref(), rule.as_ref());
        }
        self
    }

    /// Alias of [`Validation::string_rules`].
    pub fn config_rules<K, V>(&mut self, rules: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.string_rules(rules)
    }

    /// Filter comma-separated `fields` with a chain such as `trim|int`
    /// before any rule runs.
    pub fn filter_rule(&mut self, fields: &str, chain: &str) -> &mut Self {
        let chain = filters::parse_chain(chain);
        if !chain.is_empty() {
            self.filter_rules.push(FilterRule {
                fields: split_fields(fields),
                chain,
            });
        }
        self
    }

    /// Value injected when the field is absent or empty.
    pub fn set_default(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.defaults.insert(field.to_string(), value.into());
        self
    }

    /// Declared rules, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    // ---- extension points --------------------------------------------

    /// Register a validator usable by name in this engine's rules.
    ///
    /// ```rust,ignore
    /// v.add_validator("even", |n: i64| n % 2 == 0);
    /// v.string_rule("age", "even");
    /// ```
    pub fn add_validator<F, M>(&mut self, name: &str, check: F) -> &mut Self
    where
        F: IntoCheckFunc<M>,
    {
        self.registry.add(CheckFunc::new(name, check));
        self
    }

    /// Register a filter usable by name in this engine's filter chains.
    pub fn add_filter<F>(&mut self, name: &str, filter: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.filters.add(name, filter);
        self
    }

    /// Add field display names.
    pub fn add_translates<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.translator.add_field_map(fields);
        self
    }

    /// Add message templates keyed by `validator` or `field.validator`.
    pub fn add_messages<K, V>(&mut self, messages: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.translator.add_messages(messages);
        self
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    // ---- data ----------------------------------------------------------

    /// Current value of a field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.data.as_ref()?.get(field)
    }

    /// The data source, if construction succeeded.
    pub fn data(&self) -> Option<&dyn DataSource> {
        self.data.as_deref()
    }

    /// The concrete data behind the engine: the record for record sources,
    /// otherwise the source itself (`MapData`, `FormData`).
    pub fn record<T: 'static>(&self) -> Option<&T> {
        self.data.as_ref()?.as_any().downcast_ref()
    }

    // ---- results -------------------------------------------------------

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Validated fields with their post-filter values; empty unless passed.
    pub fn safe_data(&self) -> &IndexMap<String, Value> {
        &self.safe_data
    }

    /// One safe value.
    pub fn safe_val(&self, field: &str) -> Option<&Value> {
        self.safe_data.get(field)
    }

    /// Deserialize the safe data into a typed value.
    pub fn bind_safe_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let map: Map<String, Value> = self
            .safe_data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(Value::Object(map))
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the last run passed.
    pub fn is_ok(&self) -> bool {
        self.state == State::Passed
    }

    /// Whether the last run failed.
    pub fn is_fail(&self) -> bool {
        self.state == State::Failed
    }

    /// Clear errors and safe data so the engine can run again.
    ///
    /// A construction error is kept.
    pub fn reset_result(&mut self) -> &mut Self {
        self.errors.clear();
        self.safe_data.clear();
        self.state = State::Unvalidated;
        if let Some(message) = &self.init_error {
            self.errors.add(DATA_ERROR_KEY, message.clone());
        }
        self
    }

    // ---- running -------------------------------------------------------

    /// Run the rules under the selected scene.
    ///
    /// # Panics
    ///
    /// Panics on configuration errors, including running twice without
    /// [`Validation::reset_result`]. Use [`Validation::try_validate`] to get
    /// them as values.
    pub fn validate(&mut self) -> bool {
        unwrap_run(self.run(None))
    }

    /// Run the rules under `scene`.
    ///
    /// # Panics
    ///
    /// Same as [`Validation::validate`].
    pub fn validate_scene(&mut self, scene: &str) -> bool {
        unwrap_run(self.run(Some(scene)))
    }

    /// Run the rules, returning configuration errors.
    pub fn try_validate(&mut self) -> Result<bool, ConfigError> {
        self.run(None)
    }

    /// Run the rules under `scene`, returning configuration errors.
    pub fn try_validate_scene(&mut self, scene: &str) -> Result<bool, ConfigError> {
        self.run(Some(scene))
    }

    fn run(&mut self, scene: Option<&str>) -> Result<bool, ConfigError> {
        if self.state != State::Unvalidated {
            return Err(ConfigError::AlreadyValidated);
        }
        if let Some(scene) = scene {
            self.scene = Some(scene.to_string());
        }
        if self.data.is_none() {
            trace_debug!("no data to validate");
            self.state = State::Failed;
            return Ok(false);
        }

        // Hooks read the engine during the run, so the rule list stays in place.
        let rules = self.rules.clone();
        let outcome = self.run_rules(&rules);

        match outcome {
            Ok(validated) => {
                self.finish(validated);
                Ok(self.is_ok())
            }
            Err(err) => {
                trace_warn!(error = %err, "validation aborted");
                self.safe_data.clear();
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn run_rules(&mut self, rules: &[Rule]) -> Result<IndexSet<String>, ConfigError> {
        self.apply_defaults();

        let filter_rules = mem::take(&mut self.filter_rules);
        let filtered = self.apply_filter_rules(&filter_rules);
        self.filter_rules = filter_rules;
        filtered?;

        let excluded: HashSet<&str> = rules
            .iter()
            .filter(|rule| rule.is_exclusion())
            .flat_map(|rule| rule.fields().iter().map(String::as_str))
            .collect();
        let active: Option<Vec<String>> = self
            .scene
            .as_ref()
            .and_then(|scene| self.scenes.get(scene))
            .cloned();

        let mut validated = IndexSet::new();
        for rule in rules {
            if rule.is_exclusion() || rule.fields().is_empty() {
                continue;
            }
            if let Some(scene) = rule.scene() {
                if self.scene.as_deref() != Some(scene) {
                    trace_trace!(validator = rule.validator(), scene, "rule belongs to another scene");
                    continue;
                }
            }

            // Resolved on the first active field, so rules outside the scene
            // are never checked.
            let mut target = None;
            for field in rule.fields() {
                if excluded.contains(field.as_str()) {
                    continue;
                }
                if let Some(active) = &active {
                    if !active.contains(field) {
                        continue;
                    }
                }
                if target.is_none() {
                    let resolved = self.target_for(rule)?;
                    resolved.arity.check(&resolved.name, rule.args().len())?;
                    target = Some(resolved);
                }
                let Some(target) = &target else {
                    continue;
                };
                if let Flow::Stop = self.check_field(rule, target, field, &mut validated) {
                    return Ok(validated);
                }
            }
        }
        Ok(validated)
    }

    fn target_for(&self, rule: &Rule) -> Result<Target, ConfigError> {
        if let Some(check) = rule.check() {
            return Ok(Target::check(rule.validator(), check.clone()));
        }
        self.registry
            .resolve(rule.validator())
            .map(Target::resolved)
            .ok_or_else(|| ConfigError::UnknownValidator(rule.validator().to_string()))
    }

    fn check_field(
        &mut self,
        rule: &Rule,
        target: &Target,
        field: &str,
        validated: &mut IndexSet<String>,
    ) -> Flow {
        if let Some(before) = rule.before() {
            if !before(field, &*self) {
                trace_debug!(field, validator = %target.name, "skipped by before hook");
                return Flow::Continue;
            }
        }

        let input = if target.reads_files() {
            self.data
                .as_ref()
                .and_then(|data| data.file(field))
                .cloned()
                .map(Input::File)
        } else {
            self.get(field).map(Input::Value)
        };

        let absent = input.is_none();
        let empty = match &input {
            None => true,
            Some(Input::Value(value)) => value::is_empty(value),
            Some(Input::File(_)) => false,
        };
        let skip_empty = rule.skip_empty().unwrap_or(self.skip_on_empty);
        if !target.empty_aware && ((rule.is_optional() && absent) || (skip_empty && empty)) {
            trace_trace!(field, validator = %target.name, "skipped empty value");
            return Flow::Continue;
        }

        let mut input = input.unwrap_or(Input::Value(Value::Null));
        if let (Some(filter), Input::Value(value)) = (rule.filter(), &mut input) {
            match filter(mem::take(value)) {
                Ok(filtered) => {
                    if let Some(data) = self.data.as_mut() {
                        if let Err(err) = data.set(field, filtered.clone()) {
                            self.errors.add(field, err.to_string());
                        }
                    }
                    *value = filtered;
                }
                Err(err) => {
                    self.record_filter_error(field, &err);
                    return Flow::Continue;
                }
            }
        }

        let args = rule.args();
        let passed = match (&target.call, &input) {
            (Call::Builtin(ValidatorFn::Value(check)), Input::Value(value)) => check(value, args),
            (Call::Builtin(ValidatorFn::Field(check)), Input::Value(value)) => args
                .first()
                .map(value::display)
                .and_then(|other| self.get(&other))
                .map_or(false, |other| check(value, &other)),
            (Call::Builtin(ValidatorFn::File(check)), Input::File(file)) => check(file, args),
            (Call::Check(check), Input::Value(value)) => match check.call(value, args) {
                Ok(passed) => passed,
                Err(reason) => {
                    trace_debug!(field, validator = %target.name, %reason, "custom check errored");
                    false
                }
            },
            // A file validator without an uploaded file.
            _ => false,
        };
        validated.insert(field.to_string());

        if passed {
            return Flow::Continue;
        }

        let display_args = self.display_args(target, args);
        let message = rule.error_message(field, &target.name, &self.translator, &display_args);
        trace_debug!(field, validator = %target.name, %message, "field failed");
        self.errors.add(field, message);

        if self.stop_on_error {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Arguments as shown in messages; cross-field targets use display names.
    fn display_args(&self, target: &Target, args: &[Value]) -> Vec<Value> {
        let mut shown = args.to_vec();
        if target.cross_field {
            if let Some(first) = shown.first_mut() {
                let other = value::display(first);
                *first = Value::String(self.translator.field_name(&other).to_string());
            }
        }
        shown
    }

    fn record_filter_error(&mut self, field: &str, err: &FilterError) {
        trace_debug!(field, filter = %err.filter, error = %err.message, "filter failed");
        let message = self
            .translator
            .message(FILTER_KEY, field, &[Value::String(err.message.clone())]);
        self.errors.add(field, message);
    }

    fn apply_defaults(&mut self) {
        let Some(data) = self.data.as_mut() else {
            return;
        };
        for (field, default) in &self.defaults {
            let missing = data.get(field).map_or(true, |value| value::is_empty(&value));
            if missing {
                trace_trace!(field = %field, "injecting default value");
                if let Err(err) = data.set(field, default.clone()) {
                    self.errors.add(field.clone(), err.to_string());
                }
            }
        }
    }

    fn apply_filter_rules(&mut self, filter_rules: &[FilterRule]) -> Result<(), ConfigError> {
        for filter_rule in filter_rules {
            let chain = self.filters.resolve_chain(&filter_rule.chain)?;
            for field in &filter_rule.fields {
                let Some(data) = self.data.as_mut() else {
                    return Ok(());
                };
                let Some(current) = data.get(field) else {
                    continue;
                };
                match filters::apply_chain(&chain, current) {
                    Ok(filtered) => {
                        if let Err(err) = data.set(field, filtered) {
                            self.errors.add(field.clone(), err.to_string());
                        }
                    }
                    Err(err) => {
                        trace_debug!(field = %field, filter = %err.filter, "filter failed");
                        let message = self.translator.message(
                            FILTER_KEY,
                            field,
                            &[Value::String(err.message.clone())],
                        );
                        self.errors.add(field.clone(), message);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, validated: IndexSet<String>) {
        if self.errors.is_empty() {
            for field in validated {
                if let Some(value) = self.get(&field) {
                    self.safe_data.insert(field, value);
                }
            }
            self.state = State::Passed;
        } else {
            self.safe_data.clear();
            self.state = State::Failed;
        }
        trace_debug!(
            passed = self.is_ok(),
            errors = self.errors.len(),
            safe_fields = self.safe_data.len(),
            "validation finished"
        );
    }
}

fn unwrap_run(result: Result<bool, ConfigError>) -> bool {
    match result {
        Ok(passed) => passed,
        Err(err) => panic!("{}", err),
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("has_data", &self.data.is_some())
            .field("rules", &self.rules)
            .field("scene", &self.scene)
            .field("scenes", &self.scenes)
            .field("stop_on_error", &self.stop_on_error)
            .field("skip_on_empty", &self.skip_on_empty)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FormData, MapData};
    use serde_json::json;

    fn sample() -> Validation {
        Validation::from_result(MapData::from_value(json!({
            "name": "inhere",
            "age": 100,
            "oldSt": 1,
            "newSt": 2,
            "email": "some@e.com"
        })))
    }

    #[test]
    fn failing_rule_records_default_message() {
        let mut v = sample();
        v.add_rule("name", "required", ());
        v.add_rule("name", "minLen", [7]);
        v.add_rule("age", "max", [99]);

        assert!(!v.validate());
        assert_eq!(v.errors().first("name"), Some("name min length is 7"));
        // Stopped at the first failure.
        assert!(!v.errors().has("age"));
        assert!(v.safe_data().is_empty());
        assert_eq!(v.state(), State::Failed);
    }

    #[test]
    fn passing_run_fills_safe_data_with_validated_fields_only() {
        let mut v = sample();
        v.string_rules([("name", "required|string"), ("age", "int|min:1")]);

        assert!(v.validate());
        assert!(v.is_ok());
        assert_eq!(v.safe_data().len(), 2);
        assert_eq!(v.safe_val("name"), Some(&json!("inhere")));
        assert_eq!(v.safe_val("email"), None);
    }

    #[test]
    fn construction_error_fails_without_running() {
        let mut v = Validation::from_result(MapData::from_value(Value::Null));
        v.add_rule("name", "required", ());

        assert!(v.errors().to_string().contains("invalid input data"));
        assert!(!v.validate());
        assert!(v.errors().has(DATA_ERROR_KEY));
        assert!(v.safe_data().is_empty());

        v.reset_result();
        assert!(v.errors().has(DATA_ERROR_KEY));
    }

    #[test]
    fn second_run_requires_reset() {
        let mut v = sample();
        v.string_rule("name", "minLen:7");

        assert_eq!(v.try_validate(), Ok(false));
        assert_eq!(v.try_validate(), Err(ConfigError::AlreadyValidated));

        let first = v.errors().clone();
        v.reset_result();
        assert_eq!(v.state(), State::Unvalidated);
        assert_eq!(v.try_validate(), Ok(false));
        assert_eq!(v.errors(), &first);
    }

    #[test]
    #[should_panic(expected = "validation already ran")]
    fn validate_twice_panics() {
        let mut v = sample();
        v.validate();
        v.validate();
    }

    #[test]
    fn unknown_validator_is_a_config_error() {
        let mut v = sample();
        v.add_rule("name", "noSuchThing", ());
        assert_eq!(
            v.try_validate(),
            Err(ConfigError::UnknownValidator("noSuchThing".into()))
        );
    }

    #[test]
    fn arity_mismatch_is_a_config_error() {
        let mut v = sample();
        v.add_rule("name", "minLen", ());
        assert!(matches!(
            v.try_validate(),
            Err(ConfigError::Arity { got: 0, .. })
        ));
    }

    #[test]
    fn skip_empty_and_optional() {
        let mut v = Validation::new(MapData::from_value(json!({"nick": ""})).unwrap());
        v.set_stop_on_error(false);
        v.add_rule("nick", "minLen", [3]);
        v.add_rule("missing", "email", ());
        assert!(v.validate());

        let mut v = Validation::new(MapData::from_value(json!({"nick": ""})).unwrap());
        v.set_skip_on_empty(false).set_stop_on_error(false);
        v.add_rule("nick", "minLen", [3]);
        v.add_rule("missing", "email", ()).set_optional(true);
        assert!(!v.validate());
        assert!(v.errors().has("nick"));
        assert!(!v.errors().has("missing"));
    }

    #[test]
    fn required_runs_even_when_skipping_empty() {
        let mut v = Validation::new(MapData::from_value(json!({"name": ""})).unwrap());
        v.add_rule("name", "required", ()).set_skip_empty(true);
        v.add_rule("absent", "required", ()).set_optional(true);
        v.set_stop_on_error(false);

        assert!(!v.validate());
        assert_eq!(
            v.errors().first("name"),
            Some("name is required and not empty")
        );
        assert!(v.errors().has("absent"));
    }

    #[test]
    fn cross_field_message_uses_display_name() {
        let mut v = sample();
        v.add_translates([("oldSt", "Old Status")]);
        v.string_rule("oldSt", "gtField:newSt");

        assert!(!v.validate());
        assert_eq!(
            v.errors().first("oldSt"),
            Some("Old Status value must be greater than the field newSt")
        );

        let mut v = sample();
        v.add_translates([("newSt", "New Status")]);
        v.string_rule("oldSt", "gtField:newSt");
        v.validate();
        assert_eq!(
            v.errors().first("oldSt"),
            Some("oldSt value must be greater than the field New Status")
        );
    }

    #[test]
    fn scenes_limit_fields() {
        let mut v = sample();
        v.set_stop_on_error(false);
        v.string_rules([("name", "minLen:7"), ("age", "min:101")]);
        v.with_scenes([("create", vec!["name", "age"]), ("update", vec!["name"])]);

        assert!(!v.validate_scene("create"));
        assert!(v.errors().has("name"));
        assert!(v.errors().has("age"));

        v.reset_result();
        assert!(!v.validate_scene("update"));
        assert!(v.errors().has("name"));
        assert!(!v.errors().has("age"));
        assert_eq!(v.errors().one(), Some("name min length is 7"));
    }

    #[test]
    fn rule_scene_restriction() {
        let mut v = sample();
        v.add_rule("age", "max", [10]).set_scene("update");

        assert!(v.validate_scene("create"));
        v.reset_result();
        assert!(!v.validate_scene("update"));
    }

    #[test]
    fn exclusion_marker_opts_field_out() {
        let mut v = sample();
        v.add_rule("age", "max", [10]);
        v.add_rule("age", "-", ());
        assert!(v.validate());
        assert!(v.safe_val("age").is_none());
    }

    #[test]
    fn before_hook_can_skip() {
        let mut v = sample();
        v.add_rule("age", "max", [10])
            .set_before_func(|_, v| v.get("name") != Some(json!("inhere")));
        assert!(v.validate());
    }

    #[test]
    fn before_hook_sees_declared_rules() {
        let mut v = sample();
        v.add_rule("age", "max", [10])
            .set_before_func(|_, v| v.rules().len() == 2);
        v.add_rule("name", "required", ());

        assert!(!v.validate());
        assert!(v.errors().has("age"));
        assert_eq!(v.rules().len(), 2);
    }

    #[test]
    fn config_errors_outside_the_scene_are_not_raised() {
        let configure = |v: &mut Validation| {
            v.with_scenes([("update", vec!["name"])]);
            v.add_rule("age", "minLen", ());
            v.add_rule("email", "noSuchThing", ());
            v.add_rule("name", "required", ());
        };

        let mut v = sample();
        configure(&mut v);
        assert_eq!(v.try_validate_scene("update"), Ok(true));

        let mut v = sample();
        configure(&mut v);
        assert!(matches!(v.try_validate(), Err(ConfigError::Arity { .. })));
    }

    #[test]
    fn filter_hook_rewrites_value() {
        let mut v = Validation::new(FormData::from_pairs([("age", " 42 ")]));
        v.add_rule("age", "int", ())
            .set_filter_func(|value| {
                let text = value::display(&value);
                text.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| FilterError::new("trim_int", e.to_string()))
            });

        assert!(v.validate());
        assert_eq!(v.safe_val("age"), Some(&json!(42)));
        assert_eq!(v.get("age"), Some(json!(42)));
    }

    #[test]
    fn filter_errors_do_not_block_other_fields() {
        let mut v = Validation::new(FormData::from_pairs([("age", "ten"), ("name", "x")]));
        v.set_stop_on_error(false);
        v.filter_rule("age", "int");
        v.string_rule("name", "minLen:3");

        assert!(!v.validate());
        assert_eq!(
            v.errors().first("age"),
            Some("age could not be filtered: cannot convert 'ten' to int")
        );
        assert_eq!(v.errors().first("name"), Some("name min length is 3"));
    }

    #[test]
    fn unknown_filter_is_a_config_error() {
        let mut v = sample();
        v.filter_rule("age", "toRoman");
        assert_eq!(
            v.try_validate(),
            Err(ConfigError::UnknownFilter("toRoman".into()))
        );
    }

    #[test]
    fn defaults_fill_absent_values() {
        let mut v = sample();
        v.string_rule("role", "default:guest|enum:guest,admin");
        v.string_rule("age", "default:18|int");

        assert!(v.validate());
        assert_eq!(v.safe_val("role"), Some(&json!("guest")));
        assert_eq!(v.safe_val("age"), Some(&json!(100)));
    }

    #[test]
    fn custom_validators_by_name() {
        let mut v = sample();
        v.add_validator("even", |n: i64| n % 2 == 0);
        v.add_validator("divisible", |n: i64, by: i64| n % by == 0);
        v.string_rules([("age", "even|divisible:25"), ("newSt", "even")]);
        assert!(v.validate());

        let mut v = sample();
        v.add_validator("even", |n: i64| n % 2 == 0);
        v.string_rule("oldSt", "even");
        assert!(!v.validate());
        assert_eq!(v.errors().first("oldSt"), Some("oldSt did not pass validate"));
    }

    #[test]
    fn rule_check_func_and_messages() {
        let mut v = sample();
        v.add_rule("name", "fourChars", ())
            .set_check_func(|s: String| s.chars().count() == 4)
            .set_messages([("name.fourChars", "need four chars")]);

        assert!(!v.validate());
        assert_eq!(v.errors().first("name"), Some("need four chars"));
    }

    #[test]
    fn bind_safe_data_into_struct() {
        #[derive(serde::Deserialize)]
        struct Out {
            name: String,
            age: u32,
        }

        let mut v = sample();
        v.string_rules([("name", "required"), ("age", "required")]);
        assert!(v.validate());
        let out: Out = v.bind_safe_data().unwrap();
        assert_eq!(out.name, "inhere");
        assert_eq!(out.age, 100);
    }

    #[test]
    fn typed_access_to_source() {
        let v = sample();
        let map = v.record::<MapData>().unwrap();
        assert_eq!(map.as_map().len(), 5);
    }
}

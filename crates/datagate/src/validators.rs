//! Built-in validator catalog.
//!
//! Each function answers one question about a value. Type checks accept the
//! textual form of a value too, because form data arrives as strings.

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::data::UploadedFile;
use crate::registry::{Arity, Validator};
use crate::value::{self, compare, is_empty, length_of, loose_eq, to_f64, to_i64, to_usize};

// Pre-compiled regex patterns
static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static PATTERNS: OnceLock<Mutex<HashMap<String, Option<Regex>>>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_REGEX
        .get_or_init(|| {
            // RFC 5322 simplified
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
            )
            .ok()
        })
        .as_ref()
}

fn url_regex() -> Option<&'static Regex> {
    URL_REGEX
        .get_or_init(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").ok())
        .as_ref()
}

/// Match against a rule-supplied pattern, compiling each pattern once.
fn matches_pattern(pattern: &str, text: &str) -> bool {
    let cache = PATTERNS.get_or_init(Default::default);
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let compiled = cache.entry(pattern.to_string()).or_insert_with(|| {
        let compiled = Regex::new(pattern).ok();
        if compiled.is_none() {
            trace_warn!(pattern = pattern, "invalid regexp pattern, rule always fails");
        }
        compiled
    });
    compiled.as_ref().map_or(false, |re| re.is_match(text))
}

/// The built-in table, keyed by canonical name in the registry.
pub(crate) const BUILTIN: &[Validator] = &[
    Validator::value("required", Arity::exactly(0), required).empty_aware(),
    // types
    Validator::value("string", Arity::between(0, 2), string),
    Validator::value("int", Arity::between(0, 2), int),
    Validator::value("uint", Arity::exactly(0), uint),
    Validator::value("float", Arity::exactly(0), float),
    Validator::value("bool", Arity::exactly(0), boolean),
    Validator::value("number", Arity::exactly(0), number),
    Validator::value("array", Arity::exactly(0), array),
    Validator::value("map", Arity::exactly(0), map),
    // formats
    Validator::value("email", Arity::exactly(0), email),
    Validator::value("url", Arity::exactly(0), url),
    Validator::value("ip", Arity::exactly(0), ip),
    Validator::value("alpha", Arity::exactly(0), alpha),
    Validator::value("alphaNum", Arity::exactly(0), alpha_num),
    Validator::value("alphaDash", Arity::exactly(0), alpha_dash),
    Validator::value("regexp", Arity::exactly(1), regexp),
    // bounds
    Validator::value("min", Arity::exactly(1), min),
    Validator::value("max", Arity::exactly(1), max),
    Validator::value("range", Arity::exactly(2), range),
    Validator::value("lt", Arity::exactly(1), lt),
    Validator::value("gt", Arity::exactly(1), gt),
    Validator::value("len", Arity::exactly(1), len),
    Validator::value("minLen", Arity::exactly(1), min_len),
    Validator::value("maxLen", Arity::exactly(1), max_len),
    // membership
    Validator::value("enum", Arity::at_least(1), in_enum),
    Validator::value("notIn", Arity::at_least(1), not_in),
    Validator::value("contains", Arity::exactly(1), contains),
    Validator::value("startsWith", Arity::exactly(1), starts_with),
    Validator::value("endsWith", Arity::exactly(1), ends_with),
    // cross-field
    Validator::field("eqField", eq_field),
    Validator::field("neField", ne_field),
    Validator::field("gtField", gt_field),
    Validator::field("gteField", gte_field),
    Validator::field("ltField", lt_field),
    Validator::field("lteField", lte_field),
    // uploads
    Validator::file("isFile", Arity::exactly(0), is_file),
    Validator::file("isImage", Arity::at_least(0), is_image),
    Validator::file("inMimeTypes", Arity::at_least(1), in_mime_types),
];

fn required(value: &Value, _: &[Value]) -> bool {
    !is_empty(value)
}

fn within_length(value: &Value, args: &[Value]) -> bool {
    let Some(len) = length_of(value) else {
        return false;
    };
    let min_ok = args.first().and_then(to_usize).map_or(true, |min| len >= min);
    let max_ok = args.get(1).and_then(to_usize).map_or(true, |max| len <= max);
    min_ok && max_ok
}

fn string(value: &Value, args: &[Value]) -> bool {
    value.is_string() && within_length(value, args)
}

fn int(value: &Value, args: &[Value]) -> bool {
    let Some(n) = to_i64(value) else {
        return false;
    };
    let min_ok = args.first().and_then(to_i64).map_or(true, |min| n >= min);
    let max_ok = args.get(1).and_then(to_i64).map_or(true, |max| n <= max);
    min_ok && max_ok
}

fn uint(value: &Value, _: &[Value]) -> bool {
    value::to_u64(value).is_some()
}

fn float(value: &Value, _: &[Value]) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn boolean(value: &Value, _: &[Value]) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "false" | "1" | "0" | "on" | "off" | "yes" | "no"
        ),
        _ => false,
    }
}

fn number(value: &Value, _: &[Value]) -> bool {
    to_f64(value).is_some()
}

fn array(value: &Value, _: &[Value]) -> bool {
    value.is_array()
}

fn map(value: &Value, _: &[Value]) -> bool {
    value.is_object()
}

fn text_matches(value: &Value, check: impl Fn(&str) -> bool) -> bool {
    value.as_str().map_or(false, check)
}

fn email(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| email_regex().map_or(false, |re| re.is_match(s)))
}

fn url(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| url_regex().map_or(false, |re| re.is_match(s)))
}

fn ip(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| s.parse::<IpAddr>().is_ok())
}

fn alpha(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| !s.is_empty() && s.chars().all(char::is_alphabetic))
}

fn alpha_num(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| !s.is_empty() && s.chars().all(char::is_alphanumeric))
}

fn alpha_dash(value: &Value, _: &[Value]) -> bool {
    text_matches(value, |s| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    })
}

fn regexp(value: &Value, args: &[Value]) -> bool {
    let pattern = args.first().and_then(Value::as_str).unwrap_or_default();
    match value {
        Value::String(s) => matches_pattern(pattern, s),
        Value::Number(n) => matches_pattern(pattern, &n.to_string()),
        _ => false,
    }
}

fn number_cmp(value: &Value, args: &[Value], accept: fn(f64, f64) -> bool) -> bool {
    match (to_f64(value), args.first().and_then(to_f64)) {
        (Some(v), Some(bound)) => accept(v, bound),
        _ => false,
    }
}

fn min(value: &Value, args: &[Value]) -> bool {
    number_cmp(value, args, |v, bound| v >= bound)
}

fn max(value: &Value, args: &[Value]) -> bool {
    number_cmp(value, args, |v, bound| v <= bound)
}

fn lt(value: &Value, args: &[Value]) -> bool {
    number_cmp(value, args, |v, bound| v < bound)
}

fn gt(value: &Value, args: &[Value]) -> bool {
    number_cmp(value, args, |v, bound| v > bound)
}

fn range(value: &Value, args: &[Value]) -> bool {
    min(value, &args[..1.min(args.len())]) && max(value, args.get(1..).unwrap_or_default())
}

fn length_cmp(value: &Value, args: &[Value], accept: fn(usize, usize) -> bool) -> bool {
    match (length_of(value), args.first().and_then(to_usize)) {
        (Some(len), Some(bound)) => accept(len, bound),
        _ => false,
    }
}

fn len(value: &Value, args: &[Value]) -> bool {
    length_cmp(value, args, |len, n| len == n)
}

fn min_len(value: &Value, args: &[Value]) -> bool {
    length_cmp(value, args, |len, n| len >= n)
}

fn max_len(value: &Value, args: &[Value]) -> bool {
    length_cmp(value, args, |len, n| len <= n)
}

/// Membership set: one array argument, or the arguments themselves.
fn member_set(args: &[Value]) -> &[Value] {
    match args {
        [Value::Array(items)] => items,
        _ => args,
    }
}

fn in_enum(value: &Value, args: &[Value]) -> bool {
    member_set(args).iter().any(|item| loose_eq(value, item))
}

fn not_in(value: &Value, args: &[Value]) -> bool {
    !in_enum(value, args)
}

fn contains(value: &Value, args: &[Value]) -> bool {
    let Some(needle) = args.first() else {
        return false;
    };
    match value {
        Value::String(s) => s.contains(&value::display(needle)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => needle.as_str().map_or(false, |key| map.contains_key(key)),
        _ => false,
    }
}

fn starts_with(value: &Value, args: &[Value]) -> bool {
    let prefix = args.first().map(value::display).unwrap_or_default();
    text_matches(value, |s| s.starts_with(&prefix))
}

fn ends_with(value: &Value, args: &[Value]) -> bool {
    let suffix = args.first().map(value::display).unwrap_or_default();
    text_matches(value, |s| s.ends_with(&suffix))
}

fn eq_field(value: &Value, other: &Value) -> bool {
    loose_eq(value, other)
}

fn ne_field(value: &Value, other: &Value) -> bool {
    !loose_eq(value, other)
}

fn gt_field(value: &Value, other: &Value) -> bool {
    compare(value, other) == Some(Ordering::Greater)
}

fn gte_field(value: &Value, other: &Value) -> bool {
    matches!(compare(value, other), Some(Ordering::Greater | Ordering::Equal))
}

fn lt_field(value: &Value, other: &Value) -> bool {
    compare(value, other) == Some(Ordering::Less)
}

fn lte_field(value: &Value, other: &Value) -> bool {
    matches!(compare(value, other), Some(Ordering::Less | Ordering::Equal))
}

fn is_file(file: &UploadedFile, _: &[Value]) -> bool {
    !file.file_name().is_empty()
}

fn is_image(file: &UploadedFile, args: &[Value]) -> bool {
    let Some(mime) = file.mime_type() else {
        return false;
    };
    let Some(subtype) = mime.strip_prefix("image/") else {
        return false;
    };
    // Optional allow-list of extensions, e.g. `isImage:png,jpeg`.
    args.is_empty()
        || args
            .iter()
            .any(|ext| value::display(ext).eq_ignore_ascii_case(subtype))
}

fn in_mime_types(file: &UploadedFile, args: &[Value]) -> bool {
    let Some(mime) = file.mime_type() else {
        return false;
    };
    member_set(args)
        .iter()
        .any(|allowed| value::display(allowed).eq_ignore_ascii_case(&mime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_rejects_empty_values() {
        assert!(required(&json!("x"), &[]));
        assert!(!required(&json!(""), &[]));
        assert!(!required(&Value::Null, &[]));
        assert!(!required(&json!([]), &[]));
    }

    #[test]
    fn int_with_bounds() {
        assert!(int(&json!(3), &[]));
        assert!(int(&json!("3"), &[json!(1), json!(5)]));
        assert!(!int(&json!(6), &[json!(1), json!(5)]));
        assert!(int(&json!(2), &[json!(1)]));
        assert!(!int(&json!("abc"), &[]));
        assert!(!int(&json!(1.5), &[]));
    }

    #[test]
    fn string_and_lengths() {
        assert!(string(&json!("inhere"), &[]));
        assert!(!string(&json!(1), &[]));
        assert!(string(&json!("inhere"), &[json!(2), json!(10)]));
        assert!(len(&json!("inhere"), &[json!(6)]));
        assert!(!min_len(&json!("inhere"), &[json!(7)]));
        assert!(max_len(&json!([1, 2]), &[json!(2)]));
        assert!(min_len(&json!("héllo"), &[json!(5)]));
    }

    #[test]
    fn numeric_bounds() {
        assert!(!max(&json!(100), &[json!(99)]));
        assert!(min(&json!("10"), &[json!(10)]));
        assert!(range(&json!(50), &[json!(1), json!(99)]));
        assert!(!range(&json!(100), &[json!(1), json!(99)]));
        assert!(lt(&json!(1), &[json!(5)]));
        assert!(!gt(&json!(0), &[json!(0)]));
        assert!(!min(&json!("abc"), &[json!(1)]));
    }

    #[test]
    fn formats() {
        assert!(email(&json!("some@e.com"), &[]));
        assert!(!email(&json!("not-an-email"), &[]));
        assert!(url(&json!("https://github.com/inhere"), &[]));
        assert!(!url(&json!("github"), &[]));
        assert!(ip(&json!("127.0.0.1"), &[]));
        assert!(ip(&json!("::1"), &[]));
        assert!(alpha_dash(&json!("a-b_c1"), &[]));
        assert!(!alpha(&json!("a1"), &[]));
    }

    #[test]
    fn regexp_keeps_commas() {
        assert!(regexp(&json!("1234"), &[json!(r"^\d{4,6}$")]));
        assert!(!regexp(&json!("12"), &[json!(r"^\d{4,6}$")]));
        assert!(!regexp(&json!("12"), &[json!("(")]));
    }

    #[test]
    fn membership() {
        assert!(in_enum(&json!(1), &[json!([1, 2, 3])]));
        assert!(in_enum(&json!("2"), &[json!([1, 2, 3])]));
        assert!(in_enum(&json!("b"), &[json!("a"), json!("b")]));
        assert!(not_in(&json!(1), &[json!([4, 5])]));
        assert!(contains(&json!("inhere"), &[json!("her")]));
        assert!(contains(&json!(["a", "b"]), &[json!("b")]));
        assert!(starts_with(&json!("inhere"), &[json!("in")]));
        assert!(ends_with(&json!("inhere"), &[json!("re")]));
    }

    #[test]
    fn cross_field_comparisons() {
        assert!(gt_field(&json!(2), &json!(1)));
        assert!(!gt_field(&json!(1), &json!(2)));
        assert!(gt_field(&json!("10"), &json!(9)));
        assert!(gte_field(&json!(2), &json!(2)));
        assert!(eq_field(&json!("pass"), &json!("pass")));
        assert!(ne_field(&json!("a"), &json!("b")));
        assert!(!lt_field(&json!(1), &Value::Null));
    }

    #[test]
    fn uploads() {
        let png = UploadedFile::new("avatar", "me.png", Some("image/png".into()), &b"x"[..]);
        let txt = UploadedFile::new("doc", "a.txt", Some("text/plain".into()), &b"x"[..]);

        assert!(is_file(&png, &[]));
        assert!(is_image(&png, &[]));
        assert!(is_image(&png, &[json!("png"), json!("jpeg")]));
        assert!(!is_image(&png, &[json!("gif")]));
        assert!(!is_image(&txt, &[]));
        assert!(in_mime_types(&txt, &[json!("text/plain")]));
        assert!(!in_mime_types(&png, &[json!(["text/plain"])]));
    }
}

//! String rule parser.
//!
//! Compiles `required|int:1,5|default:3` into directives:
//!
//! - a bare token (`required`) is a validator without arguments
//! - `name:a,b` passes `a` and `b` as positional arguments, each coerced to
//!   a number or boolean when it looks like one
//! - `regexp:<pattern>` passes the whole pattern as one argument
//! - `enum:a,b` and `notIn:a,b` pass one array of the members as written
//! - `default:<value>` sets a default value instead of adding a rule

use serde_json::Value;

use crate::registry::validator_name;
use crate::value::coerce_str;

/// One compiled token of a string rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Run a validator with arguments.
    Validate { validator: String, args: Vec<Value> },
    /// Inject a value when the field is absent or empty.
    Default(Value),
}

/// Split a comma-separated argument string, trimming each argument.
pub fn parse_args(raw: &str) -> Vec<String> {
    raw.split(',').map(|arg| arg.trim().to_string()).collect()
}

/// Compile a pipe-delimited rule string.
pub fn parse(rule: &str) -> Vec<Directive> {
    rule.trim_matches(|c: char| c == '|' || c == ':' || c.is_whitespace())
        .split('|')
        .map(|token| token.trim_matches(|c: char| c == ':' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Directive {
    let Some((name, raw)) = token.split_once(':') else {
        return Directive::Validate {
            validator: token.to_string(),
            args: Vec::new(),
        };
    };
    let name = name.trim();

    let args = match validator_name(name) {
        "default" => return Directive::Default(coerce_str(raw.trim())),
        "regexp" => vec![Value::String(raw.to_string())],
        "enum" | "notIn" => vec![Value::Array(
            parse_args(raw).into_iter().map(Value::String).collect(),
        )],
        _ => parse_args(raw).iter().map(|arg| coerce_str(arg)).collect(),
    };

    Directive::Validate {
        validator: name.to_string(),
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn validate(validator: &str, args: Vec<Value>) -> Directive {
        Directive::Validate {
            validator: validator.to_string(),
            args,
        }
    }

    #[test]
    fn bare_and_positional_tokens() {
        assert_eq!(
            parse("required|int:1,5"),
            vec![validate("required", vec![]), validate("int", vec![json!(1), json!(5)])]
        );
        assert_eq!(
            parse("string|len:6|minLen:2|maxLen:10"),
            vec![
                validate("string", vec![]),
                validate("len", vec![json!(6)]),
                validate("minLen", vec![json!(2)]),
                validate("maxLen", vec![json!(10)]),
            ]
        );
    }

    #[test]
    fn stray_separators_are_ignored() {
        assert_eq!(
            parse(" |required||: email :| "),
            vec![validate("required", vec![]), validate("email", vec![])]
        );
        assert!(parse("").is_empty());
        assert!(parse("|||").is_empty());
    }

    #[test]
    fn regexp_keeps_whole_pattern() {
        assert_eq!(
            parse(r"regexp:^\d{4,6}$|required"),
            vec![
                validate("regexp", vec![json!(r"^\d{4,6}$")]),
                validate("required", vec![]),
            ]
        );
        assert_eq!(
            parse("regex:a:b"),
            vec![validate("regex", vec![json!("a:b")])]
        );
    }

    #[test]
    fn enum_groups_arguments() {
        assert_eq!(
            parse("in:1,2,3|notIn:4,5"),
            vec![
                validate("in", vec![json!(["1", "2", "3"])]),
                validate("notIn", vec![json!(["4", "5"])]),
            ]
        );
        assert_eq!(
            parse("enum:007, 008"),
            vec![validate("enum", vec![json!(["007", "008"])])]
        );
    }

    #[test]
    fn default_is_not_a_rule() {
        assert_eq!(
            parse("default:18|int"),
            vec![Directive::Default(json!(18)), validate("int", vec![])]
        );
        assert_eq!(parse("default:guest"), vec![Directive::Default(json!("guest"))]);
    }

    #[test]
    fn argument_coercion() {
        assert_eq!(
            parse("x:1,-2,1.5,true,abc"),
            vec![validate(
                "x",
                vec![json!(1), json!(-2), json!(1.5), json!(true), json!("abc")]
            )]
        );
        assert_eq!(
            parse("startsWith:007|x:+5,1.50"),
            vec![
                validate("startsWith", vec![json!("007")]),
                validate("x", vec![json!("+5"), json!("1.50")]),
            ]
        );
        assert_eq!(parse("default:007"), vec![Directive::Default(json!("007"))]);
    }

    proptest! {
        #[test]
        fn parse_never_yields_empty_names(rule in "[a-z:|,0-9 ]{0,40}") {
            for directive in parse(&rule) {
                if let Directive::Validate { validator, .. } = directive {
                    prop_assert!(!validator.is_empty());
                    prop_assert!(!validator.contains('|'));
                }
            }
        }

        #[test]
        fn one_directive_per_token(names in prop::collection::vec("[a-z]{1,8}", 1..6)) {
            let rule = names.join("|");
            let parsed = parse(&rule);
            prop_assert_eq!(parsed.len(), names.len());
        }
    }
}

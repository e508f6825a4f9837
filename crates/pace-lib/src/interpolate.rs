//! Substitution of argument placeholders in command templates.
//!
//! Three placeholder forms are supported, substituted in precedence order:
//! named (`$name`, bound by position through the task's args schema), then
//! numeric (`$1`..`$N`, scanned high to low so `$10` is not eaten by `$1`),
//! then `$@` for all extras joined by single spaces. Each placeholder is
//! substituted at most once, so a value containing `$2` cannot cascade into
//! a later phase.

use std::collections::HashSet;

use crate::{config::ArgsSpec, run::Error};

pub fn interpolate(command: &str, extras: &[String], spec: Option<&ArgsSpec>) -> String {
    let mut result = command.to_string();
    let mut replaced: HashSet<String> = HashSet::new();

    if let Some(spec) = spec {
        let names = spec.required.iter().chain(spec.optional.iter());
        for (value, name) in extras.iter().zip(names) {
            let placeholder = format!("${name}");
            if result.contains(&placeholder) && replaced.insert(placeholder.clone()) {
                result = result.replace(&placeholder, value);
            }
        }
    }

    for i in (1..=extras.len()).rev() {
        let placeholder = format!("${i}");
        if result.contains(&placeholder) && replaced.insert(placeholder.clone()) {
            result = result.replace(&placeholder, &extras[i - 1]);
        }
    }

    if result.contains("$@") && replaced.insert("$@".to_string()) {
        result = result.replace("$@", &extras.join(" "));
    }

    result
}

/// Whether the extras fit the task's args schema. Tasks without a schema
/// accept any number of positional extras.
pub fn validate_extras(
    task_name: &str,
    extras: &[String],
    spec: Option<&ArgsSpec>,
) -> Result<(), Error> {
    let Some(spec) = spec else {
        return Ok(());
    };

    let required = spec.required.len();
    let optional = spec.optional.len();
    if extras.len() < required || extras.len() > required + optional {
        return Err(Error::ArgMismatch {
            name: task_name.to_string(),
            got: extras.len(),
            required,
            optional,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn extras(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn spec(required: &[&str], optional: &[&str]) -> ArgsSpec {
        ArgsSpec {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test_case("echo $@", &["a", "b"], "echo a b" ; "all extras")]
    #[test_case("echo $1 then $2", &["a", "b"], "echo a then b" ; "numeric")]
    #[test_case("echo $2", &["a", "b"], "echo b" ; "numeric out of order")]
    #[test_case("echo $1 $@", &["a", "b"], "echo a a b" ; "numeric and splat")]
    #[test_case("echo hi", &["a"], "echo hi" ; "no placeholders")]
    #[test_case("echo $3", &["a", "b"], "echo $3" ; "missing extra stays literal")]
    fn test_positional(command: &str, args: &[&str], expected: &str) {
        assert_eq!(interpolate(command, &extras(args), None), expected);
    }

    #[test]
    fn test_ten_is_not_eaten_by_one() {
        let args = extras(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "ten"]);
        assert_eq!(interpolate("echo $10", &args, None), "echo ten");
    }

    #[test]
    fn test_named_placeholders_bind_by_position() {
        let spec = spec(&["host"], &["port"]);
        assert_eq!(
            interpolate("ssh $host -p $port", &extras(&["db1", "2222"]), Some(&spec)),
            "ssh db1 -p 2222"
        );
    }

    #[test]
    fn test_named_wins_over_numeric() {
        // `$1` refers to the first extra even when a named schema is present,
        // but a name consumed by the named phase is not replaced again.
        let spec = spec(&["target"], &[]);
        assert_eq!(
            interpolate("build $target $1", &extras(&["linux"]), Some(&spec)),
            "build linux linux"
        );
    }

    #[test]
    fn test_value_containing_placeholder_does_not_cascade() {
        assert_eq!(
            interpolate("echo $1", &extras(&["$@"]), None),
            "echo $@"
        );
    }

    #[test]
    fn test_validate_without_schema_accepts_anything() {
        assert!(validate_extras("t", &extras(&["a", "b", "c"]), None).is_ok());
    }

    #[test_case(0, true ; "none required none given")]
    #[test_case(1, true ; "optional filled")]
    #[test_case(2, false ; "too many")]
    fn test_validate_optional_bounds(count: usize, ok: bool) {
        let spec = spec(&[], &["flag"]);
        let given: Vec<String> = (0..count).map(|i| i.to_string()).collect();
        assert_eq!(validate_extras("t", &given, Some(&spec)).is_ok(), ok);
    }

    #[test]
    fn test_validate_missing_required_is_mismatch() {
        let spec = spec(&["host", "port"], &[]);
        let err = validate_extras("deploy", &extras(&["db1"]), Some(&spec)).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgMismatch {
                got: 1,
                required: 2,
                optional: 0,
                ..
            }
        ));
    }
}

use convo_core::{ConvoError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

// ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Replace `${VAR}` references in every string of `value` using `lookup`.
///
/// All missing variables are collected and reported together in one
/// `ConfigError`, so a user can fix the environment in a single pass.
pub fn substitute_env_vars<F>(value: &mut Value, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    substitute_value(value, lookup, &mut missing);

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(ConvoError::ConfigError(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn substitute_value<F>(value: &mut Value, lookup: &F, missing: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => {
            if ENV_VAR_REGEX.is_match(s) {
                *s = substitute_in_string(s, lookup, missing);
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                substitute_value(v, lookup, missing);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                substitute_value(v, lookup, missing);
            }
        }
        _ => {}
    }
}

fn substitute_in_string<F>(input: &str, lookup: &F, missing: &mut Vec<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR_REGEX
        .replace_all(input, |cap: &Captures| {
            let name = &cap[1];
            match (lookup(name), cap.get(2)) {
                (Some(value), _) => value,
                (None, Some(default)) => default.as_str().to_string(),
                (None, None) => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        })
        .into_owned()
}

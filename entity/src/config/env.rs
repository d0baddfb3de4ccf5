//! `${VAR}` and `${VAR:-default}` substitution inside configuration strings.

use crate::errors::ConfigError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("placeholder pattern")
    })
}

/// Replaces placeholders in every string of `value` using the process environment.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] for a placeholder with no value and no default.
pub fn interpolate_env(value: &mut Value) -> Result<(), ConfigError> {
    interpolate_env_with(value, &|name| std::env::var(name).ok())
}

/// Replaces placeholders using a caller-supplied lookup.
///
/// Object keys are left alone; only string values are rewritten.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] for a placeholder with no value and no default.
pub fn interpolate_env_with(
    value: &mut Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    match value {
        Value::String(s) => {
            if let Some(replaced) = interpolate_str(s, lookup)? {
                *s = replaced;
            }
        }
        Value::Array(items) => {
            for item in items {
                interpolate_env_with(item, lookup)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                interpolate_env_with(item, lookup)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

fn interpolate_str(
    input: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Option<String>, ConfigError> {
    if !input.contains("${") {
        return Ok(None);
    }

    let mut missing = None;
    let replaced = placeholder().replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnv(name)),
        None => Ok(Some(replaced.into_owned())),
    }
}

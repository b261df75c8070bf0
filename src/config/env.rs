//! `${VAR}` / `${VAR:default}` placeholder resolution for config values.

/// Resolve placeholders in every string of a TOML tree.
///
/// Only whole-string placeholders are recognized. A variable that is unset
/// and has no default resolves to an empty string.
pub fn resolve_placeholders(value: toml::Value, lookup: &dyn Fn(&str) -> Option<String>) -> toml::Value {
    match value {
        toml::Value::String(s) => toml::Value::String(resolve_str(&s, lookup)),
        toml::Value::Array(items) => toml::Value::Array(
            items
                .into_iter()
                .map(|item| resolve_placeholders(item, lookup))
                .collect(),
        ),
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(k, v)| (k, resolve_placeholders(v, lookup)))
                .collect(),
        ),
        other => other,
    }
}

fn resolve_str(raw: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let Some(inner) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) else {
        return raw.to_string();
    };

    let (name, default) = match inner.split_once(':') {
        Some((name, default)) => (name, Some(default)),
        None => (inner, None),
    };

    if let Some(value) = lookup(name) {
        return value;
    }
    match default {
        Some(default) => default.to_string(),
        None => {
            tracing::warn!(var = name, "environment variable not set and no default; using empty string");
            String::new()
        }
    }
}

/// Lookup backed by the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

//! URL template resolution for path placeholders.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::Params;

// Matches `/:identifier` segments. The identifier must start with a letter
// or underscore, so numeric colon-segments (ports) are never rewritten.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/:([A-Za-z_][A-Za-z0-9_-]*)").expect("placeholder pattern"));

/// Resolves `/:identifier` placeholders in `template` from `params`.
///
/// Each placeholder is replaced with the stringified value of the matching
/// key, or the empty string when the key is absent. Pure function, no I/O.
pub fn resolve_path(template: &str, params: &Params) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = params.get(&caps[1]).map(stringify_value).unwrap_or_default();
            format!("/{value}")
        })
        .into_owned()
}

/// Stringifies a JSON value for embedding in a path or query string.
/// Strings are used verbatim (no quotes), null becomes empty.
pub(crate) fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

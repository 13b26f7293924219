//! Header maps and default/override merging.
//!
//! Header names are case-insensitive on the wire, so every lookup and
//! replacement here ignores ASCII case. A map built only through these
//! helpers never holds two spellings of the same name.

use std::collections::HashMap;

/// Header name to value, as spelled by whoever set it.
pub type Headers = HashMap<String, String>;

/// Look up a header value, ignoring ASCII case in the name.
pub fn get_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    if let Some(value) = headers.get(name) {
        return Some(value.as_str());
    }
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn contains_header(headers: &Headers, name: &str) -> bool {
    get_header(headers, name).is_some()
}

/// Set `name` to `value`, dropping any entry spelled differently.
pub fn set_header(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    headers.retain(|key, _| key == &name || !key.eq_ignore_ascii_case(&name));
    headers.insert(name, value.into());
}

/// Combine process-wide defaults with per-call overrides.
///
/// An override replaces a default of the same name in any casing, and keeps
/// its own spelling. There is no way to remove a default, only to replace
/// its value.
pub fn merge_headers(defaults: &Headers, overrides: &Headers) -> Headers {
    let mut merged = Headers::with_capacity(defaults.len() + overrides.len());
    for (name, value) in defaults {
        if !contains_header(overrides, name) {
            merged.insert(name.clone(), value.clone());
        }
    }
    for (name, value) in overrides {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

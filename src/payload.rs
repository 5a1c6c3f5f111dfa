//! Helpers for reading loosely shaped upstream payloads.
//!
//! Every upstream item is handled as a generic `serde_json::Value`. Field
//! reads go through ordered [`Extractor`] chains: the first extractor that
//! yields non-blank text wins.

use serde_json::Value;

pub type Extractor = Box<dyn Fn(&Value) -> Option<String>>;

/// Reads `name` from an object, matching the key case-insensitively.
pub fn key(name: &'static str) -> Extractor {
    Box::new(move |item: &Value| field(item, name).and_then(scalar_text))
}

/// Reads `name` and prepends `prefix` to a non-blank value.
pub fn prefixed(name: &'static str, prefix: &'static str) -> Extractor {
    Box::new(move |item: &Value| {
        field(item, name)
            .and_then(scalar_text)
            .map(|value| format!("{prefix}{value}"))
    })
}

/// Always yields `value`; used to terminate a chain with a default.
pub fn constant(value: &'static str) -> Extractor {
    Box::new(move |_: &Value| Some(value.to_string()))
}

pub fn first_text(item: &Value, extractors: &[Extractor]) -> Option<String> {
    extractors
        .iter()
        .filter_map(|extract| extract(item))
        .find(|value| !value.trim().is_empty())
}

/// Like [`first_text`], but an exhausted chain yields an empty string.
pub fn text_or_empty(item: &Value, extractors: &[Extractor]) -> String {
    first_text(item, extractors).unwrap_or_default()
}

pub fn field<'a>(item: &'a Value, name: &str) -> Option<&'a Value> {
    let object = item.as_object()?;
    object.get(name).or_else(|| {
        object
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Text of a string, number or boolean. Containers and nulls yield `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Every scalar under `value`, depth first. Object members follow map order.
pub fn flatten_texts(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_texts(value, &mut out);
    out
}

fn collect_texts(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_texts(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_texts(item, out)),
        other => {
            if let Some(text) = scalar_text(other) {
                out.push(text);
            }
        }
    }
}

/// All scalars under `value` joined by spaces, lower-cased. Used by
/// relevance predicates that only care whether a word appears somewhere.
pub fn haystack(value: &Value) -> String {
    flatten_texts(value).join(" ").to_lowercase()
}

/// Entries of a list-valued field. A scalar counts as a one-entry list.
pub fn list_entries<'a>(item: &'a Value, name: &str) -> Vec<&'a Value> {
    match field(item, name) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Items of a collection payload: the first of `wrappers` holding an array
/// or object wins. A bare top-level array is its own collection and a
/// single object counts as a one-item collection.
pub fn collection_items<'a>(payload: &'a Value, wrappers: &[&str]) -> Vec<&'a Value> {
    if let Value::Array(items) = payload {
        return items.iter().collect();
    }
    for wrapper in wrappers {
        match field(payload, wrapper) {
            Some(Value::Array(items)) => return items.iter().collect(),
            Some(object @ Value::Object(_)) => return vec![object],
            _ => {}
        }
    }
    Vec::new()
}

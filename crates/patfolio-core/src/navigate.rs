//! Resilient navigation over the provider's JSON shape.
//!
//! The upstream payload mixes singletons with one-element lists, `"$"` with
//! `"#text"` markers, and moves fields between nesting levels across record
//! eras. Everything here tolerates all of that: absence is an empty result,
//! never an error.

use serde_json::Value;

/// Every value whose key contains one of `fragments` (case-insensitive), in a
/// stable depth-first order. A matched value's subtree is still descended, so
/// occurrences nested inside other occurrences are all reported — exactly once
/// each.
pub fn find_by_key_fragments<'a>(root: &'a Value, fragments: &[&str]) -> Vec<&'a Value> {
    let needles: Vec<String> = fragments.iter().map(|f| f.to_ascii_lowercase()).collect();
    let mut found = Vec::new();
    walk(root, &needles, &mut found);
    found
}

fn walk<'a>(node: &'a Value, needles: &[String], found: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let key_lower = key.to_ascii_lowercase();
                if needles.iter().any(|needle| key_lower.contains(needle.as_str())) {
                    found.push(value);
                }
                walk(value, needles, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, needles, found);
            }
        }
        _ => {}
    }
}

/// Coerce the provider's value-or-list-of-one ambiguity to a uniform slice.
/// `Null` coerces to the empty slice; any other non-array value is a singleton.
pub fn as_sequence(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}

/// Text content of a provider node, trying the alternate representations in
/// fixed priority order: inline marker `"$"`, attribute marker `"#text"`,
/// bare string. Empty text counts as absent.
pub fn text_of(value: &Value) -> Option<&str> {
    value["$"]
        .as_str()
        .or_else(|| value["#text"].as_str())
        .or_else(|| value.as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// First non-empty text among a value-or-list node's elements.
pub fn first_text(value: &Value) -> Option<&str> {
    as_sequence(value).iter().find_map(text_of)
}

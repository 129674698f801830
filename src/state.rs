use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical application state shared between the AR lens and the host page.
///
/// Replaced wholesale on every successful `set_state`; never mutated in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionState {
    /// Collectible item names, in the order first observed.
    #[serde(default)]
    pub names: Vec<String>,

    /// Per-name collected flag. Every entry in `names` has a key here.
    #[serde(default)]
    pub collected: BTreeMap<String, bool>,

    /// Milliseconds since the Unix epoch when this snapshot was produced.
    #[serde(rename = "t", default = "now_ms")]
    pub timestamp: f64,
}

impl Default for CollectionState {
    fn default() -> Self {
        CollectionState {
            names: Vec::new(),
            collected: BTreeMap::new(),
            timestamp: now_ms(),
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

/// Normalize an arbitrary, untrusted JSON value into a well-formed state.
///
/// The merge is deliberately asymmetric and must stay that way for lens
/// compatibility: a name listed in `names` with an explicit falsy entry in
/// `collected` stays uncollected, but a truthy `collected` key missing from
/// `names` is appended and forced to `true`.
pub fn sanitize(raw: &Value) -> CollectionState {
    let raw_names = raw
        .get("names")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut names: Vec<String> = raw_names.iter().map(coerce_string).collect();

    let raw_collected = raw.get("collected").and_then(Value::as_object);

    let mut collected = BTreeMap::new();
    for name in &names {
        // An absent key defaults to collected; a present-but-falsy value
        // (including JSON null) does not.
        let flag = match raw_collected.and_then(|map| map.get(name)) {
            None => true,
            Some(value) => is_truthy(value),
        };
        collected.insert(name.clone(), flag);
    }

    if let Some(map) = raw_collected {
        for (key, value) in map {
            if is_truthy(value) {
                collected.insert(key.clone(), true);
                if !names.iter().any(|name| name == key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let timestamp = raw
        .get("t")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .unwrap_or_else(now_ms);

    CollectionState {
        names,
        collected,
        timestamp,
    }
}

/// String coercion matching the original wire format: strings pass through,
/// everything else is rendered as its JSON text.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JS-style truthiness: false, 0, NaN, "" and null are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

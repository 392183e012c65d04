//! Dot-path access into a workflow context
//!
//! Paths address nested values with `.`-separated segments, e.g.
//! `user.address.city`. Reads may index arrays with numeric segments;
//! writes only ever create objects.

use serde_json::{Map, Value};

/// Resolve `path` inside `obj`.
///
/// Returns `None` when the path is empty, a segment is missing, an
/// intermediate is a scalar, or the resolved value is `null`.
pub fn get<'a>(obj: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = obj.get(first)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Like [`get`] but yields `Value::Null` for anything unresolved.
pub fn get_or_null(obj: &Map<String, Value>, path: &str) -> Value {
    get(obj, path).cloned().unwrap_or(Value::Null)
}

/// Assign `value` at `path`, creating intermediate objects.
///
/// Any non-object found along the way (arrays included) is replaced by an
/// empty object before descending.
pub fn set(obj: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = obj;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Build a new object holding only `paths`, skipping unresolved ones.
pub fn pick(obj: &Map<String, Value>, paths: &[String]) -> Map<String, Value> {
    let mut picked = Map::new();
    for path in paths {
        if let Some(value) = get(obj, path) {
            set(&mut picked, path, value.clone());
        }
    }
    picked
}

/// Whether `path` is usable as a step key: non-empty, no leading or
/// trailing dot.
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && !path.starts_with('.') && !path.ends_with('.')
}

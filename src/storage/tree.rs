//! Addressing inside stored JSON values.
//!
//! Index segments address list elements. On an object an index segment is
//! read as its decimal key, so `"2024"` works whether it was parsed as a
//! key or an index.

use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::path::{NodePath, PathSegment};

/// Short name of a value's JSON type for error messages.
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn object_key(segment: &PathSegment) -> String {
    segment.to_string()
}

fn list_index(segment: &PathSegment) -> Option<usize> {
    match segment {
        PathSegment::Index(i) => usize::try_from(*i).ok(),
        PathSegment::Key(_) => None,
    }
}

fn mismatch(path: &str, segment: &PathSegment, found: &Value) -> StorageError {
    StorageError::TypeMismatch {
        path: path.to_string(),
        segment: segment.to_string(),
        found: kind(found),
    }
}

/// Value at `inner` below `value`, if present.
pub(crate) fn get_in<'a>(value: &'a Value, inner: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in inner {
        current = match current {
            Value::Object(map) => map.get(&object_key(segment))?,
            Value::Array(items) => items.get(list_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets the value at `inner` below `value`.
///
/// Missing object keys are created. A list index must address an existing
/// element or be equal to the list length, which appends.
pub(crate) fn set_in(
    value: &mut Value,
    inner: &[PathSegment],
    new_value: Value,
    path: &str,
) -> Result<(), StorageError> {
    let Some((segment, rest)) = inner.split_first() else {
        *value = new_value;
        return Ok(());
    };

    match value {
        Value::Object(map) => {
            let key = object_key(segment);
            if rest.is_empty() {
                map.insert(key, new_value);
                return Ok(());
            }
            let child = map.entry(key).or_insert_with(|| Value::Object(Map::new()));
            set_in(child, rest, new_value, path)
        }
        Value::Array(items) => {
            let Some(index) = list_index(segment) else {
                return Err(StorageError::TypeMismatch {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    found: "list",
                });
            };
            let len = items.len();
            if index < len {
                set_in(&mut items[index], rest, new_value, path)
            } else if index == len && rest.is_empty() {
                items.push(new_value);
                Ok(())
            } else {
                Err(StorageError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: index as u64,
                    len,
                })
            }
        }
        other => Err(mismatch(path, segment, other)),
    }
}

/// Removes the value at `inner` below `value`. Returns false if absent.
///
/// Removing a list element shifts the following elements down.
pub(crate) fn remove_in(value: &mut Value, inner: &[PathSegment]) -> bool {
    let Some((last, parents)) = inner.split_last() else {
        return false;
    };

    let mut current = value;
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(&object_key(segment)),
            Value::Array(items) => match list_index(segment) {
                Some(i) => items.get_mut(i),
                None => None,
            },
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }

    match current {
        Value::Object(map) => map.remove(&object_key(last)).is_some(),
        Value::Array(items) => match list_index(last) {
            Some(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Update semantics at a whole leaf: objects are shallow-merged, anything
/// else replaces.
pub(crate) fn merge_update(current: &mut Value, update: Value) {
    match (current, update) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.insert(k, v);
            }
        }
        (current, update) => *current = update,
    }
}

fn insert_nested(map: &mut Map<String, Value>, keys: &[String], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }
    let child = map.entry(first.clone()).or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child_map) = child {
        insert_nested(child_map, rest, value);
    }
}

/// Builds the object formed by `leaves` below `root`.
pub(crate) fn assemble<'a, I>(root: &NodePath, leaves: I) -> Value
where
    I: IntoIterator<Item = (&'a NodePath, &'a Value)>,
{
    let mut out = Map::new();
    for (path, value) in leaves {
        if let Some(relative) = path.segments().get(root.len()..) {
            insert_nested(&mut out, relative, value.clone());
        }
    }
    Value::Object(out)
}

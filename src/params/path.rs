// Field paths - Apply a "dot.path = value" edit to a serializable struct
//
// The struct is converted to a JSON tree, the addressed leaf is replaced, and
// the tree is deserialized back. Unknown paths are rejected; paths are never
// created. A value of the wrong shape fails deserialization and leaves the
// original untouched.

use crate::error::ParamError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Replace the value at `path` inside `root`
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), ParamError> {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    if path.is_empty() {
        return Err(ParamError::UnknownField(path.to_string()));
    }

    while let Some(segment) = segments.next() {
        let slot = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        let slot = slot.ok_or_else(|| ParamError::UnknownField(path.to_string()))?;

        if segments.peek().is_none() {
            *slot = value;
            return Ok(());
        }
        current = slot;
    }

    Err(ParamError::UnknownField(path.to_string()))
}

/// Return a copy of `target` with `path` set to `value`
///
/// `immutable` lists top-level fields that may not be edited (ids, kind tags).
pub fn edit<T>(target: &T, path: &str, value: Value, immutable: &[&str]) -> Result<T, ParamError>
where
    T: Serialize + DeserializeOwned,
{
    let head = path.split('.').next().unwrap_or_default();
    if immutable.contains(&head) {
        return Err(ParamError::ImmutableField(path.to_string()));
    }

    let mut tree = serde_json::to_value(target).map_err(|e| ParamError::InvalidValue {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    set_path(&mut tree, path, value)?;

    serde_json::from_value(tree).map_err(|e| ParamError::InvalidValue {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

//! low level patches applied to a rendered resource node.
//!
//! A resource node looks like `{ "Type": .., "Properties": { .. }, "DependsOn": [..] }`.
//! Paths are dot separated, and a segment that parses as an integer indexes into an
//! array, so `Properties.DistributionConfig.Origins.0.DomainName` patches the domain
//! of the first origin. Higher level modules use these when the typed resource
//! does not (yet) model a field the way cloudformation expects it.

use serde_json::{Map, Value};

use crate::CfnError;

#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    Set { path: String, value: Value },
    Delete { path: String },
}

impl Override {
    /// override relative to the resource node, eg: `Properties.X.Y` or `Metadata.Z`
    pub fn raw(path: &str, value: impl Into<Value>) -> Self {
        Override::Set { path: path.to_string(), value: value.into() }
    }

    /// override relative to `Properties`
    pub fn property(path: &str, value: impl Into<Value>) -> Self {
        Override::Set { path: format!("Properties.{path}"), value: value.into() }
    }

    /// delete a key relative to `Properties`
    pub fn property_deletion(path: &str) -> Self {
        Override::Delete { path: format!("Properties.{path}") }
    }

    pub fn path(&self) -> &str {
        match self {
            Override::Set { path, .. } | Override::Delete { path } => path,
        }
    }

    pub fn apply(&self, node: &mut Value) -> Result<(), CfnError> {
        match self {
            Override::Set { path, value } => set_path(node, path, value.clone()),
            Override::Delete { path } => delete_path(node, path),
        }
    }
}

/// applies overrides in order. Later overrides see the result of earlier ones.
pub fn apply_overrides(node: &mut Value, overrides: &[Override]) -> Result<(), CfnError> {
    for o in overrides {
        tracing::debug!(path = o.path(), "applying override");
        o.apply(node)?;
    }
    Ok(())
}

fn split_path(path: &str) -> Result<Vec<&str>, CfnError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CfnError::override_failed(path, "path contains an empty segment"));
    }
    Ok(segments)
}

fn array_index(path: &str, segment: &str, len: usize) -> Result<usize, CfnError> {
    let index: usize = segment
        .parse()
        .map_err(|_| CfnError::override_failed(path, format!("'{segment}' is not a valid array index")))?;
    if index >= len {
        return Err(CfnError::override_failed(
            path,
            format!("index {index} is out of bounds for array of length {len}"),
        ));
    }
    Ok(index)
}

fn set_path(node: &mut Value, path: &str, value: Value) -> Result<(), CfnError> {
    let segments = split_path(path)?;
    let (last, parents) = match segments.split_last() {
        Some(s) => s,
        None => return Err(CfnError::override_failed(path, "empty path")),
    };
    let mut current = node;
    for segment in parents {
        current = match current {
            Value::Object(map) => {
                let entry = map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                // anything that isnt a container gets replaced, same as creating it.
                if !entry.is_object() && !entry.is_array() {
                    *entry = Value::Object(Map::new());
                }
                entry
            }
            Value::Array(items) => {
                let index = array_index(path, segment, items.len())?;
                &mut items[index]
            }
            _ => return Err(CfnError::override_failed(path, format!("cannot descend into '{segment}'"))),
        };
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
        }
        Value::Array(items) => {
            let index = array_index(path, last, items.len())?;
            items[index] = value;
        }
        _ => return Err(CfnError::override_failed(path, format!("cannot set '{last}' on a scalar value"))),
    }
    Ok(())
}

fn delete_path(node: &mut Value, path: &str) -> Result<(), CfnError> {
    let segments = split_path(path)?;
    let (last, parents) = match segments.split_last() {
        Some(s) => s,
        None => return Err(CfnError::override_failed(path, "empty path")),
    };
    let mut current = node;
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        current = match next {
            Some(n) => n,
            // nothing to delete
            None => return Ok(()),
        };
    }
    match current {
        Value::Object(map) => {
            map.remove(*last);
        }
        Value::Array(items) => {
            if let Ok(index) = last.parse::<usize>() {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

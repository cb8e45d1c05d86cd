//! Patch operations over a JSON state tree.
//!
//! ## Op Semantics
//!
//! ### Add
//! - Creates a new value at `path`; the parent must exist
//! - On arrays, inserts at the index (appending when index == len)
//! - Fails if an object member already exists at `path`
//!
//! ### Replace
//! - Atomic replacement of an existing value
//! - Fails if nothing exists at `path` (no implicit add)
//!
//! ### Remove
//! - Removes the value at `path`; fails if absent

use crate::path::PatchPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single structural edit on a tree's JSON state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    Add { path: PatchPath, value: Value },
    Replace { path: PatchPath, value: Value },
    Remove { path: PatchPath },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("path not found: {0}")]
    PathNotFound(PatchPath),

    #[error("parent not found: {0}")]
    ParentNotFound(PatchPath),

    #[error("value already exists at {0}")]
    AlreadyExists(PatchPath),

    #[error("not a container at {0}")]
    NotAContainer(PatchPath),

    #[error("invalid array index '{index}' at {path}")]
    InvalidIndex { path: PatchPath, index: String },

    #[error("cannot {op} the document root")]
    RootNotAllowed { op: &'static str },
}

impl PatchOp {
    /// Target path of this op.
    pub fn path(&self) -> &PatchPath {
        match self {
            PatchOp::Add { path, .. } => path,
            PatchOp::Replace { path, .. } => path,
            PatchOp::Remove { path } => path,
        }
    }

    /// Apply this op to `state`, validating first.
    pub fn apply(&self, state: &mut Value) -> Result<(), PatchError> {
        match self {
            PatchOp::Add { path, value } => Self::apply_add(state, path, value),
            PatchOp::Replace { path, value } => Self::apply_replace(state, path, value),
            PatchOp::Remove { path } => Self::apply_remove(state, path).map(|_| ()),
        }
    }

    fn apply_add(state: &mut Value, path: &PatchPath, value: &Value) -> Result<(), PatchError> {
        let Some((parent_path, key)) = path.split_last() else {
            return Err(PatchError::RootNotAllowed { op: "add" });
        };

        let parent = resolve_mut(state, &parent_path)
            .ok_or_else(|| PatchError::ParentNotFound(parent_path.clone()))?;

        match parent {
            Value::Object(map) => {
                if map.contains_key(key) {
                    return Err(PatchError::AlreadyExists(path.clone()));
                }
                map.insert(key.to_string(), value.clone());
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(path, key)?;
                if index > items.len() {
                    return Err(PatchError::InvalidIndex {
                        path: path.clone(),
                        index: key.to_string(),
                    });
                }
                items.insert(index, value.clone());
                Ok(())
            }
            _ => Err(PatchError::NotAContainer(parent_path)),
        }
    }

    fn apply_replace(state: &mut Value, path: &PatchPath, value: &Value) -> Result<(), PatchError> {
        let target =
            resolve_mut(state, path).ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
        *target = value.clone();
        Ok(())
    }

    fn apply_remove(state: &mut Value, path: &PatchPath) -> Result<Value, PatchError> {
        let Some((parent_path, key)) = path.split_last() else {
            return Err(PatchError::RootNotAllowed { op: "remove" });
        };

        let parent = resolve_mut(state, &parent_path)
            .ok_or_else(|| PatchError::ParentNotFound(parent_path.clone()))?;

        match parent {
            Value::Object(map) => map
                .remove(key)
                .ok_or_else(|| PatchError::PathNotFound(path.clone())),
            Value::Array(items) => {
                let index = parse_index(path, key)?;
                if index >= items.len() {
                    return Err(PatchError::PathNotFound(path.clone()));
                }
                Ok(items.remove(index))
            }
            _ => Err(PatchError::NotAContainer(parent_path)),
        }
    }
}

/// Resolve a path to an immutable reference inside `state`.
pub fn resolve<'a>(state: &'a Value, path: &PatchPath) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_mut<'a>(state: &'a mut Value, path: &PatchPath) -> Option<&'a mut Value> {
    let mut current = state;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn parse_index(path: &PatchPath, key: &str) -> Result<usize, PatchError> {
    key.parse::<usize>().map_err(|_| PatchError::InvalidIndex {
        path: path.clone(),
        index: key.to_string(),
    })
}

/// One captured mutation: the forward edit plus its exact inverse.
///
/// Invariant: applying `inverse` after `forward` restores the state
/// that existed before `forward` ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchPair {
    pub forward: PatchOp,
    pub inverse: PatchOp,
}

impl PatchPair {
    pub fn new(forward: PatchOp, inverse: PatchOp) -> Self {
        Self { forward, inverse }
    }

    /// Build a replace pair by reading the current value at `path`.
    pub fn replace(state: &Value, path: PatchPath, value: Value) -> Result<Self, PatchError> {
        let old = resolve(state, &path)
            .cloned()
            .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
        Ok(Self {
            forward: PatchOp::Replace {
                path: path.clone(),
                value,
            },
            inverse: PatchOp::Replace { path, value: old },
        })
    }

    /// Build an add pair; the inverse removes what was added.
    pub fn add(path: PatchPath, value: Value) -> Self {
        Self {
            forward: PatchOp::Add {
                path: path.clone(),
                value,
            },
            inverse: PatchOp::Remove { path },
        }
    }

    /// Build a remove pair by reading the value being removed.
    pub fn remove(state: &Value, path: PatchPath) -> Result<Self, PatchError> {
        let old = resolve(state, &path)
            .cloned()
            .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
        Ok(Self {
            forward: PatchOp::Remove { path: path.clone() },
            inverse: PatchOp::Add { path, value: old },
        })
    }
}

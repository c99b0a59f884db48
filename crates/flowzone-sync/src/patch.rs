//! RFC 6902 style patches between two JSON trees.
//!
//! [`diff`] produces the ops, [`apply_patch`] replays them. Paths are
//! RFC 6901 JSON pointers; array additions always name an explicit index.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One patch instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => {
                path
            }
        }
    }
}

/// Escape one reference token (`~` to `~0`, `/` to `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Ops that turn `old` into `new`.
///
/// Objects are compared key by key, arrays index by index up to the shorter
/// length. Trailing array elements are added in ascending order or removed
/// from the end. Leaves compare with type-aware equality, so `1` and `1.0`
/// differ. The root itself is never replaced: if the roots are not both
/// objects or both arrays the result is empty even when they differ.
pub fn diff(old: &Value, new: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    let mut path = String::new();
    match (old, new) {
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)) => {
            diff_into(old, new, &mut path, &mut ops)
        }
        _ => {}
    }
    ops
}

fn diff_into(old: &Value, new: &Value, path: &mut String, ops: &mut Vec<PatchOp>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, new_value) in b {
                let len = path.len();
                path.push('/');
                path.push_str(&escape_token(key));
                match a.get(key) {
                    Some(old_value) => diff_into(old_value, new_value, path, ops),
                    None => ops.push(PatchOp::Add {
                        path: path.clone(),
                        value: new_value.clone(),
                    }),
                }
                path.truncate(len);
            }
            for key in a.keys().filter(|k| !b.contains_key(*k)) {
                ops.push(PatchOp::Remove {
                    path: format!("{}/{}", path, escape_token(key)),
                });
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            let common = a.len().min(b.len());
            for (i, (old_item, new_item)) in a.iter().zip(b.iter()).enumerate() {
                let len = path.len();
                path.push('/');
                path.push_str(&i.to_string());
                diff_into(old_item, new_item, path, ops);
                path.truncate(len);
            }
            for (i, item) in b.iter().enumerate().skip(common) {
                ops.push(PatchOp::Add {
                    path: format!("{}/{}", path, i),
                    value: item.clone(),
                });
            }
            for i in (common..a.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: format!("{}/{}", path, i),
                });
            }
        }
        _ => {
            if old != new {
                ops.push(PatchOp::Replace {
                    path: path.clone(),
                    value: new.clone(),
                });
            }
        }
    }
}

fn split_pointer(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    match path.strip_prefix('/') {
        Some(rest) => Ok(rest.split('/').map(unescape_token).collect()),
        None => Err(SyncError::InvalidPointer(path.to_string())),
    }
}

fn parse_index(token: &str, path: &str) -> Result<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return Err(SyncError::InvalidPointer(path.to_string()));
    }
    token
        .parse()
        .map_err(|_| SyncError::InvalidPointer(path.to_string()))
}

fn parent_mut<'a>(doc: &'a mut Value, tokens: &[String], path: &str) -> Result<&'a mut Value> {
    let mut node = doc;
    for token in tokens {
        node = match node {
            Value::Object(map) => map.get_mut(token.as_str()),
            Value::Array(items) => {
                let index = parse_index(token, path)?;
                items.get_mut(index)
            }
            _ => None,
        }
        .ok_or_else(|| SyncError::PathNotFound(path.to_string()))?;
    }
    Ok(node)
}

/// Apply `ops` to `doc` in order. Stops at the first op that does not fit;
/// earlier ops stay applied.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp]) -> Result<()> {
    for op in ops {
        apply_op(doc, op)?;
    }
    Ok(())
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<()> {
    let path = op.path();
    let tokens = split_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        return match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                *doc = value.clone();
                Ok(())
            }
            PatchOp::Remove { .. } => Err(SyncError::InvalidPointer(path.to_string())),
        };
    };

    let parent = parent_mut(doc, parents, path)?;
    let not_found = || SyncError::PathNotFound(path.to_string());
    match parent {
        Value::Object(map) => match op {
            PatchOp::Add { value, .. } => {
                map.insert(last.clone(), value.clone());
            }
            PatchOp::Remove { .. } => {
                map.remove(last.as_str()).ok_or_else(not_found)?;
            }
            PatchOp::Replace { value, .. } => {
                *map.get_mut(last.as_str()).ok_or_else(not_found)? = value.clone();
            }
        },
        Value::Array(items) => match op {
            PatchOp::Add { value, .. } => {
                let index = if last == "-" {
                    items.len()
                } else {
                    parse_index(last, path)?
                };
                if index > items.len() {
                    return Err(not_found());
                }
                items.insert(index, value.clone());
            }
            PatchOp::Remove { .. } => {
                let index = parse_index(last, path)?;
                if index >= items.len() {
                    return Err(not_found());
                }
                items.remove(index);
            }
            PatchOp::Replace { value, .. } => {
                let index = parse_index(last, path)?;
                *items.get_mut(index).ok_or_else(not_found)? = value.clone();
            }
        },
        _ => return Err(not_found()),
    }
    Ok(())
}

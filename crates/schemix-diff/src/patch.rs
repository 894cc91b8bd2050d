//! Structural patch: the non-conflicting part of a merge step.
//!
//! A patch records every path where the incoming tree adds, replaces, or
//! removes content. Objects are compared key by key; arrays and scalars are
//! replaced whole. Applying the patch advances the accumulated tree before
//! any conflict is decided.

use schemix_types::{join_key, remove_at_path, set_at_path, Tree};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DiffError, DiffResult};

/// The ordered operations turning one tree into another.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralPatch {
    pub ops: Vec<PatchOp>,
}

impl StructuralPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Number of added paths.
    pub fn additions(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, PatchOp::Add { .. }))
            .count()
    }

    /// Number of removed paths.
    pub fn removals(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, PatchOp::Remove { .. }))
            .count()
    }

    /// Number of replaced paths.
    pub fn replacements(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, PatchOp::Replace { .. }))
            .count()
    }
}

/// A single patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// A path present only in the incoming tree.
    Add { path: String, value: Value },
    /// A path present only in the base tree.
    Remove { path: String, old: Value },
    /// A path whose value differs, where at least one side is not an object.
    Replace { path: String, old: Value, new: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path, .. } | Self::Replace { path, .. } => path,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Compute the patch from `old` to `new`.
pub fn diff_trees(old: &Tree, new: &Tree) -> StructuralPatch {
    let mut ops = Vec::new();
    diff_into("", old, new, &mut ops);
    StructuralPatch { ops }
}

fn diff_into(path: &str, old: &Value, new: &Value, ops: &mut Vec<PatchOp>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_val) in old_map {
                let child = join_key(path, key);
                match new_map.get(key) {
                    Some(new_val) => diff_into(&child, old_val, new_val, ops),
                    None => ops.push(PatchOp::Remove {
                        path: child,
                        old: old_val.clone(),
                    }),
                }
            }
            for (key, new_val) in new_map {
                if !old_map.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: join_key(path, key),
                        value: new_val.clone(),
                    });
                }
            }
        }
        _ if old != new => ops.push(PatchOp::Replace {
            path: path.to_string(),
            old: old.clone(),
            new: new.clone(),
        }),
        _ => {}
    }
}

/// Apply `patch` to a copy of `tree`.
///
/// Additions and replacements are always applied. Removals are applied only
/// when `apply_removals` is set; by default content only the accumulated
/// tree has is kept.
pub fn apply_patch(tree: &Tree, patch: &StructuralPatch, apply_removals: bool) -> DiffResult<Tree> {
    let mut out = tree.clone();
    for op in &patch.ops {
        let result = match op {
            PatchOp::Add { path, value } => set_at_path(&mut out, path, value.clone()),
            PatchOp::Replace { path, new, .. } => set_at_path(&mut out, path, new.clone()),
            PatchOp::Remove { path, .. } if apply_removals => remove_at_path(&mut out, path).map(|_| ()),
            PatchOp::Remove { .. } => Ok(()),
        };
        result.map_err(|source| DiffError::Patch {
            op: op.name(),
            path: op.path().to_string(),
            source,
        })?;
    }
    Ok(out)
}

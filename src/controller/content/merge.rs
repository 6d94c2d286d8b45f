//! # Merge and Drop
//!
//! Pure set operations over content trees. Neither function mutates its inputs.

use super::{ContentMap, ContentTree};

/// Recursive, right-biased merge.
///
/// Keys present on both sides recurse when both values are nodes; otherwise the
/// right value wins. Left-only keys are kept as they are.
pub fn union(left: &ContentMap, right: &ContentMap) -> ContentMap {
    let mut out = left.clone();
    for (key, right_value) in right {
        let merged = match (out.get(key), right_value) {
            (Some(ContentTree::Node(left_child)), ContentTree::Node(right_child)) => {
                ContentTree::Node(union(left_child, right_child))
            }
            _ => right_value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Recursive subtraction of `to_remove` from `origin`.
///
/// Returns `None` when nothing is left, which callers treat as "delete the
/// target" rather than "write an empty document".
pub fn drop(origin: &ContentMap, to_remove: &ContentMap) -> Option<ContentMap> {
    let mut out = origin.clone();
    for (key, remove_value) in to_remove {
        let Some(existing) = out.get(key) else {
            continue;
        };
        match (existing, remove_value) {
            (ContentTree::Node(existing_child), ContentTree::Node(remove_child)) => {
                match drop(existing_child, remove_child) {
                    Some(pruned) => {
                        out.insert(key.clone(), ContentTree::Node(pruned));
                    }
                    None => {
                        out.remove(key);
                    }
                }
            }
            // Node to remove over a leaf, or a leaf to remove: the key goes wholesale
            (ContentTree::Leaf(_), ContentTree::Node(_)) | (_, ContentTree::Leaf(_)) => {
                out.remove(key);
            }
        }
    }
    (!out.is_empty()).then_some(out)
}

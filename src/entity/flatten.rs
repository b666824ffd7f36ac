//! Depth-first flattening of the entity hierarchy

use crate::types::{EntityKind, EntityTree, FlatEntity};

/// Flatten entity trees into their leaves, in depth-first pre-order
///
/// A leaf nested in a group is titled `"<title> (<group title>)"`, using
/// only the nearest enclosing group. Top-level leaves keep their bare title.
/// Groups are never emitted themselves.
pub fn flatten(roots: &[EntityTree]) -> Vec<FlatEntity> {
    let mut result = Vec::new();
    flatten_into(&mut result, roots, "");
    result
}

fn flatten_into(result: &mut Vec<FlatEntity>, nodes: &[EntityTree], parent: &str) {
    for node in nodes {
        match node.kind {
            EntityKind::Group => flatten_into(result, &node.children, &node.title),
            EntityKind::Leaf => {
                let display_title = if parent.is_empty() {
                    node.title.clone()
                } else {
                    format!("{} ({})", node.title, parent)
                };
                result.push(FlatEntity::new(node.id.clone(), display_title));
            },
        }
    }
}

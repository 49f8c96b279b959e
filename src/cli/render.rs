//! Placement tree rendering with termtree

use generational_arena::Index;
use termtree::Tree;

use crate::domain::{Distributor, GenealogyTree, TreeArena};

/// One-line label for a distributor in tree views.
pub fn node_label(tree: &GenealogyTree, d: &Distributor) -> String {
    let mut label = format!(
        "{} [{}] {} pv={:.2}",
        if d.name.is_empty() { &d.id } else { &d.name },
        d.id,
        tree.ladder().name(d.rank),
        d.personal_volume
    );
    if !d.status.is_active() {
        label.push_str(" (inactive)");
    }
    label
}

/// Render the subtree under `start` (default: the root), `depth` generations deep.
///
/// Returns None when the start node does not exist or the tree is empty.
pub fn to_tree_string(
    tree: &GenealogyTree,
    start: Option<&str>,
    depth: Option<usize>,
) -> Option<Tree<String>> {
    let arena = tree.arena();
    let start_idx = match start {
        Some(id) => arena.index_of(id)?,
        None => arena.root()?,
    };
    let node = arena.get_node(start_idx)?;
    let mut root = Tree::new(node_label(tree, &node.data));
    build_tree(tree, arena, start_idx, &mut root, depth.unwrap_or(usize::MAX));
    Some(root)
}

fn build_tree(
    tree: &GenealogyTree,
    arena: &TreeArena,
    node_idx: Index,
    parent_tree: &mut Tree<String>,
    remaining: usize,
) {
    if remaining == 0 {
        return;
    }
    if let Some(node) = arena.get_node(node_idx) {
        for &child_idx in &node.children {
            if let Some(child) = arena.get_node(child_idx) {
                let mut child_tree = Tree::new(node_label(tree, &child.data));
                build_tree(tree, arena, child_idx, &mut child_tree, remaining - 1);
                parent_tree.push(child_tree);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DistributorRecord, Status};
    use chrono::Utc;

    fn record(id: &str, placement: Option<&str>) -> DistributorRecord {
        DistributorRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: None,
            parent_id: placement.map(str::to_string),
            placement_id: placement.map(str::to_string),
            status: Status::Active,
            personal_volume: 10.0,
            avatar_url: None,
            join_date: Utc::now(),
        }
    }

    #[test]
    fn given_depth_limit_when_rendering_then_omits_deeper_generations() {
        let mut tree = GenealogyTree::default();
        tree.initialize(
            vec![record("a", None), record("b", Some("a")), record("c", Some("b"))],
            vec![],
            vec![],
        )
        .unwrap();

        let full = to_tree_string(&tree, None, None).unwrap().to_string();
        let shallow = to_tree_string(&tree, None, Some(1)).unwrap().to_string();

        assert!(full.contains("[c]"));
        assert!(shallow.contains("[b]"));
        assert!(!shallow.contains("[c]"));
    }

    #[test]
    fn given_unknown_start_when_rendering_then_none() {
        let tree = GenealogyTree::default();
        assert!(to_tree_string(&tree, Some("missing"), None).is_none());
        assert!(to_tree_string(&tree, None, None).is_none());
    }
}

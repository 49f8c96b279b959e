use std::collections::HashMap;

use generational_arena::{Arena, Index};
use tracing::{instrument, warn};

use crate::domain::entities::Distributor;

/// Tree node in the arena-based placement structure.
#[derive(Debug)]
pub struct TreeNode {
    /// Distributor data with derived attributes
    pub data: Distributor,
    /// Index of the placement parent in the arena, None for roots
    pub parent: Option<Index>,
    /// Indices of directly placed children, in insertion order
    pub children: Vec<Index>,
}

/// Arena-based placement tree.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// Nodes are addressable by distributor id and keep their insertion order.
#[derive(Debug, Default)]
pub struct TreeArena {
    /// Arena storage for all tree nodes
    arena: Arena<TreeNode>,
    /// Distributor id to arena index
    ids: HashMap<String, Index>,
    /// Arena indices in insertion order
    order: Vec<Index>,
    /// Selected root, None for empty or unlinked trees
    root: Option<Index>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node without linking it. A repeated id replaces the earlier
    /// node's data but keeps its original position.
    #[instrument(level = "trace", skip(self, data), fields(id = %data.id))]
    pub fn insert_node(&mut self, data: Distributor) -> Index {
        if let Some(&idx) = self.ids.get(&data.id) {
            warn!("duplicate distributor id {}, keeping last record", data.id);
            if let Some(node) = self.arena.get_mut(idx) {
                node.data = data;
            }
            return idx;
        }
        let id = data.id.clone();
        let idx = self.arena.insert(TreeNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.ids.insert(id, idx);
        self.order.push(idx);
        idx
    }

    /// Place `child` directly under `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn attach(&mut self, child: Index, parent: Index) {
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.arena.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    pub fn index_of(&self, id: &str) -> Option<Index> {
        self.ids.get(id).copied()
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.index_of(id).and_then(|idx| self.arena.get(idx))
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<Index>) {
        self.root = root;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Arena indices in insertion order.
    pub fn indices(&self) -> &[Index] {
        &self.order
    }

    /// Nodes in insertion order.
    pub fn iter_insertion(&self) -> impl Iterator<Item = (Index, &TreeNode)> + '_ {
        self.order
            .iter()
            .filter_map(move |&idx| self.arena.get(idx).map(|node| (idx, node)))
    }

    /// Pre-order traversal from the selected root.
    pub fn iter(&self) -> TreeIterator {
        TreeIterator::new(self)
    }

    /// Number of levels below and including the root; 0 for an empty tree.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut max_depth = 0;
        let mut stack = vec![(root, 1)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.get_node(idx) {
                for &child in &node.children {
                    stack.push((child, depth + 1));
                }
            }
        }
        max_depth
    }

    /// Ids of all reachable nodes without children, in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(_, node)| node.data.id.clone())
            .collect()
    }
}

pub struct TreeIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a TreeArena) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push(root);
        }
        Self { arena, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

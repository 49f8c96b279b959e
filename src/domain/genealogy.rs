//! Genealogy tree manager.
//!
//! Rebuilds the placement tree from a flat snapshot of distributor, customer
//! and purchase records, validates its structure and recomputes every derived
//! attribute. There is no incremental update path: every change goes through
//! a full rebuild so structure and derived data always describe one snapshot.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use generational_arena::Index;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::arena::TreeArena;
use crate::domain::entities::{
    Customer, CustomerRecord, Distributor, DistributorRecord, NewDistributor, PurchaseRecord,
    Snapshot,
};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::rank::{NextRank, Rank, RankLadder};

/// Upper bound on rank recomputation passes per rebuild.
pub const DEFAULT_MAX_RANK_PASSES: usize = 15;

/// How to treat more than one distributor without a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootPolicy {
    /// Use the first root in snapshot order and log the others
    #[default]
    First,
    /// Reject the snapshot
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub max_rank_passes: usize,
    pub root_policy: RootPolicy,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_rank_passes: DEFAULT_MAX_RANK_PASSES,
            root_policy: RootPolicy::default(),
        }
    }
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Rank passes executed
    pub passes: usize,
    /// False when the pass limit was reached while ranks were still changing
    pub converged: bool,
    /// Distributors without a placement
    pub roots: usize,
}

/// Owns the canonical in-memory genealogy.
#[derive(Debug)]
pub struct GenealogyTree {
    ladder: RankLadder,
    options: TreeOptions,
    records: Snapshot,
    tree: TreeArena,
    root_candidates: Vec<Index>,
}

impl Default for GenealogyTree {
    fn default() -> Self {
        Self::new(RankLadder::default())
    }
}

impl GenealogyTree {
    pub fn new(ladder: RankLadder) -> Self {
        Self {
            ladder,
            options: TreeOptions::default(),
            records: Snapshot::default(),
            tree: TreeArena::new(),
            root_candidates: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace all state with the given records and rebuild.
    ///
    /// On error the manager is left empty and rootless.
    pub fn initialize(
        &mut self,
        distributors: Vec<DistributorRecord>,
        customers: Vec<CustomerRecord>,
        purchases: Vec<PurchaseRecord>,
    ) -> DomainResult<RebuildSummary> {
        self.load_snapshot(Snapshot {
            distributors,
            customers,
            purchases,
        })
    }

    /// Replace all state with `snapshot` and rebuild.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> DomainResult<RebuildSummary> {
        self.records = snapshot;
        self.rebuild()
    }

    #[instrument(level = "debug", skip(self))]
    fn rebuild(&mut self) -> DomainResult<RebuildSummary> {
        self.tree = TreeArena::new();
        self.root_candidates.clear();

        let (tree, roots, summary) = self.assemble()?;
        self.tree = tree;
        self.root_candidates = roots;
        info!(
            "rebuilt genealogy: {} distributors, {} rank passes, converged={}",
            self.tree.len(),
            summary.passes,
            summary.converged
        );
        Ok(summary)
    }

    fn assemble(&self) -> DomainResult<(TreeArena, Vec<Index>, RebuildSummary)> {
        let mut tree = TreeArena::new();
        let customers = customers_by_distributor(&self.records);
        for record in &self.records.distributors {
            // A repeated id replaces the earlier node, so every occurrence gets the customers
            let owned = customers.get(&record.id).cloned().unwrap_or_default();
            tree.insert_node(Distributor::from_record(record, owned));
        }
        for orphaned in customers
            .iter()
            .filter(|(distributor_id, _)| tree.index_of(distributor_id).is_none())
            .flat_map(|(_, owned)| owned)
        {
            debug!(
                "customer {} references unknown distributor {}",
                orphaned.id, orphaned.distributor_id
            );
        }

        let roots = build_tree(&mut tree, self.options.root_policy)?;
        detect_cycles(&tree)?;
        let (passes, converged) =
            compute_metrics(&mut tree, &roots, &self.ladder, self.options.max_rank_passes);

        let summary = RebuildSummary {
            passes,
            converged,
            roots: roots.len(),
        };
        Ok((tree, roots, summary))
    }

    /// The selected root distributor.
    pub fn root(&self) -> Option<&Distributor> {
        self.tree
            .root()
            .and_then(|idx| self.tree.get_node(idx))
            .map(|node| &node.data)
    }

    /// Ids of every distributor without a placement, in snapshot order.
    pub fn root_ids(&self) -> Vec<&str> {
        self.root_candidates
            .iter()
            .filter_map(|&idx| self.tree.get_node(idx))
            .map(|node| node.data.id.as_str())
            .collect()
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<&Distributor> {
        self.tree.get(id).map(|node| &node.data)
    }

    /// The distributor `id` is placed under.
    pub fn placement_parent(&self, id: &str) -> Option<&Distributor> {
        self.tree
            .get(id)
            .and_then(|node| node.parent)
            .and_then(|idx| self.tree.get_node(idx))
            .map(|node| &node.data)
    }

    /// Direct children of `id` in the placement tree.
    pub fn children_of(&self, id: &str) -> Vec<&Distributor> {
        self.tree
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|&idx| self.tree.get_node(idx))
                    .map(|child| &child.data)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All distributors in snapshot order.
    pub fn distributors(&self) -> Vec<&Distributor> {
        self.tree.iter_insertion().map(|(_, node)| &node.data).collect()
    }

    /// Customers attached to known distributors, grouped in distributor order.
    pub fn customers(&self) -> Vec<&Customer> {
        self.tree
            .iter_insertion()
            .flat_map(|(_, node)| node.data.customers.iter())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Levels in the tree under the selected root.
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn leaf_ids(&self) -> Vec<String> {
        self.tree.leaf_ids()
    }

    pub fn arena(&self) -> &TreeArena {
        &self.tree
    }

    pub fn ladder(&self) -> &RankLadder {
        &self.ladder
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    /// Source records of the current state, including added distributors.
    pub fn records(&self) -> &Snapshot {
        &self.records
    }

    pub fn get_next_rank(&self, current: Rank) -> Option<NextRank> {
        self.ladder.next_rank(current)
    }

    /// Breadth-first descendants of `id`, excluding `id` itself.
    ///
    /// `depth` limits how many generations are returned; `None` returns the
    /// whole subtree. Unknown ids yield an empty list.
    pub fn get_downline(&self, id: &str, depth: Option<usize>) -> Vec<&Distributor> {
        let Some(start) = self.tree.index_of(id) else {
            return Vec::new();
        };
        let max_depth = depth.unwrap_or(usize::MAX);

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut downline = Vec::new();

        while let Some((idx, generation)) = queue.pop_front() {
            if generation >= max_depth {
                continue;
            }
            let Some(node) = self.tree.get_node(idx) else {
                continue;
            };
            for &child in &node.children {
                if !visited.insert(child) {
                    continue;
                }
                if let Some(child_node) = self.tree.get_node(child) {
                    downline.push(&child_node.data);
                    queue.push_back((child, generation + 1));
                }
            }
        }
        downline
    }

    /// Place a new distributor under `parent_id` and rebuild.
    ///
    /// Returns the synthesized id.
    #[instrument(level = "debug", skip(self, data))]
    pub fn add_distributor(&mut self, data: NewDistributor, parent_id: &str) -> DomainResult<String> {
        if self.tree.index_of(parent_id).is_none() {
            return Err(DomainError::UnknownDistributor(parent_id.to_string()));
        }
        let id = Uuid::new_v4().to_string();
        let record = data.into_record(id.clone(), parent_id, Utc::now());
        debug!("adding distributor {} under {}", id, parent_id);
        self.records.distributors.push(record);
        self.rebuild()?;
        Ok(id)
    }
}

/// Customers with purchase totals, grouped by owning distributor id.
fn customers_by_distributor(records: &Snapshot) -> HashMap<String, Vec<Customer>> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for purchase in &records.purchases {
        *totals.entry(purchase.customer_id.as_str()).or_default() += purchase.amount;
    }

    let mut grouped: HashMap<String, Vec<Customer>> = HashMap::new();
    for record in &records.customers {
        let total = totals.get(record.id.as_str()).copied().unwrap_or(0.0);
        grouped
            .entry(record.distributor_id.clone())
            .or_default()
            .push(Customer::from_record(record, total));
    }
    grouped
}

/// Link every node under its placement and select the root.
///
/// Returns all root candidates in insertion order; the first becomes the root.
#[instrument(level = "debug", skip_all)]
fn build_tree(tree: &mut TreeArena, policy: RootPolicy) -> DomainResult<Vec<Index>> {
    let mut roots = Vec::new();
    let indices = tree.indices().to_vec();

    for idx in indices {
        let Some(node) = tree.get_node(idx) else {
            continue;
        };
        match node.data.placement_id.clone() {
            Some(placement_id) => {
                let parent = tree.index_of(&placement_id).ok_or_else(|| {
                    DomainError::UnknownPlacement {
                        id: node.data.id.clone(),
                        placement_id: placement_id.clone(),
                    }
                })?;
                tree.attach(idx, parent);
            }
            None => roots.push(idx),
        }
    }

    if roots.is_empty() && !tree.is_empty() {
        return Err(DomainError::MissingRoot { count: tree.len() });
    }
    if roots.len() > 1 {
        let ids: Vec<String> = roots
            .iter()
            .filter_map(|&idx| tree.get_node(idx))
            .map(|node| node.data.id.clone())
            .collect();
        match policy {
            RootPolicy::Strict => return Err(DomainError::MultipleRoots(ids)),
            RootPolicy::First => warn!(
                "{} root candidates ({}), using {}",
                ids.len(),
                ids.join(", "),
                ids[0]
            ),
        }
    }

    tree.set_root(roots.first().copied());
    debug!("linked {} distributors, {} roots", tree.len(), roots.len());
    Ok(roots)
}

/// Depth-first search over child edges with an explicit recursion stack.
#[instrument(level = "debug", skip_all)]
fn detect_cycles(tree: &TreeArena) -> DomainResult<()> {
    let mut visited: HashSet<Index> = HashSet::new();
    let mut on_stack: HashSet<Index> = HashSet::new();

    for &start in tree.indices() {
        if !visited.insert(start) {
            continue;
        }
        on_stack.insert(start);
        let mut frames: Vec<(Index, usize)> = vec![(start, 0)];

        while let Some(frame) = frames.last_mut() {
            let (idx, cursor) = *frame;
            let next_child = tree
                .get_node(idx)
                .and_then(|node| node.children.get(cursor))
                .copied();

            match next_child {
                Some(child) => {
                    frame.1 += 1;
                    if on_stack.contains(&child) {
                        let id = tree
                            .get_node(child)
                            .map(|node| node.data.id.clone())
                            .unwrap_or_default();
                        return Err(DomainError::CycleDetected(id));
                    }
                    if visited.insert(child) {
                        on_stack.insert(child);
                        frames.push((child, 0));
                    }
                }
                None => {
                    on_stack.remove(&idx);
                    frames.pop();
                }
            }
        }
    }
    Ok(())
}

/// Recompute levels, recruits and ranks until ranks settle.
///
/// Returns the number of passes and whether the ranks converged.
#[instrument(level = "debug", skip_all)]
fn compute_metrics(
    tree: &mut TreeArena,
    roots: &[Index],
    ladder: &RankLadder,
    max_passes: usize,
) -> (usize, bool) {
    let max_passes = max_passes.max(1);
    let mut passes = 0;

    while passes < max_passes {
        passes += 1;
        assign_levels(tree, roots);
        if !assign_ranks(tree, ladder) {
            debug!("ranks settled after {} passes", passes);
            return (passes, true);
        }
    }

    warn!(
        "rank computation did not converge within {} passes, keeping last ranks",
        max_passes
    );
    (passes, false)
}

/// Set level, recruits and can_recruit on every node reachable from a root.
fn assign_levels(tree: &mut TreeArena, roots: &[Index]) {
    let mut stack: Vec<(Index, usize)> = roots.iter().map(|&root| (root, 0)).collect();

    while let Some((idx, level)) = stack.pop() {
        let Some(node) = tree.get_node_mut(idx) else {
            continue;
        };
        node.data.level = level;
        node.data.recruits = node.children.len();
        node.data.can_recruit = node.data.status.is_active();
        for &child in node.children.iter().rev() {
            stack.push((child, level + 1));
        }
    }
}

/// Recompute ranks, deepest nodes first. Returns true if any rank changed.
fn assign_ranks(tree: &mut TreeArena, ladder: &RankLadder) -> bool {
    let order: Vec<Index> = tree
        .iter_insertion()
        .map(|(idx, node)| (idx, node.data.level))
        .sorted_by_key(|&(_, level)| Reverse(level))
        .map(|(idx, _)| idx)
        .collect();

    let mut changed = false;
    for idx in order {
        let Some(node) = tree.get_node(idx) else {
            continue;
        };
        let qualified_legs = node
            .children
            .iter()
            .filter_map(|&child| tree.get_node(child))
            .filter(|child| ladder.is_qualified_leg(child.data.recruits))
            .count();
        let rank = ladder.qualify(
            node.data.status.is_active(),
            node.data.recruits,
            qualified_legs,
        );

        if let Some(node) = tree.get_node_mut(idx) {
            if node.data.rank != rank {
                debug!("{}: {} -> {}", node.data.id, node.data.rank, rank);
                node.data.rank = rank;
                changed = true;
            }
        }
    }
    changed
}

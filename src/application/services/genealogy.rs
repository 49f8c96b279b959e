//! Genealogy service
//!
//! Owns the tree manager for one snapshot source and computes the
//! caller-side aggregates: network statistics, group volume and sponsor lineage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::application::ApplicationResult;
use crate::domain::{
    Distributor, GenealogyTree, NewDistributor, Rank, RankLadder, RebuildSummary, Snapshot, Status,
    TreeOptions,
};
use crate::infrastructure::traits::SnapshotStore;

/// Aggregate figures over the whole network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub total_distributors: usize,
    pub active: usize,
    pub inactive: usize,
    pub customers: usize,
    /// Sum of personal volume (including customer purchases) of all distributors
    pub total_volume: f64,
    /// Distributor count per rank, lowest rank first
    pub rank_histogram: BTreeMap<Rank, usize>,
    /// Levels below and including the root
    pub depth: usize,
}

/// Flat row for tabular views.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributorSummary {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub rank: Rank,
    pub rank_name: String,
    pub level: usize,
    pub recruits: usize,
    pub personal_volume: f64,
    /// Personal volume of the distributor and its whole downline
    pub group_volume: f64,
    pub customers: usize,
}

/// Service owning the genealogy of one snapshot source.
///
/// Every refresh or pushed snapshot replaces the previous state entirely.
pub struct GenealogyService {
    store: Arc<dyn SnapshotStore>,
    tree: GenealogyTree,
}

impl GenealogyService {
    /// Create a service with an empty tree; call `refresh` to load data.
    pub fn new(store: Arc<dyn SnapshotStore>, ladder: RankLadder, options: TreeOptions) -> Self {
        Self {
            store,
            tree: GenealogyTree::new(ladder).with_options(options),
        }
    }

    /// Load the current snapshot from the store and rebuild.
    pub fn refresh(&mut self) -> ApplicationResult<RebuildSummary> {
        debug!("refresh: loading snapshot from {}", self.store.location());
        let snapshot = self.store.load()?;
        self.apply_snapshot(snapshot)
    }

    /// Rebuild from a snapshot delivered by the host.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> ApplicationResult<RebuildSummary> {
        let summary = self.tree.load_snapshot(snapshot)?;
        Ok(summary)
    }

    pub fn tree(&self) -> &GenealogyTree {
        &self.tree
    }

    /// Place a new distributor under `parent_id`, rebuild and persist.
    ///
    /// A failed save restores the previous state before returning the error.
    pub fn add_distributor(
        &mut self,
        data: NewDistributor,
        parent_id: &str,
    ) -> ApplicationResult<String> {
        let previous = self.tree.records().clone();
        let id = self.tree.add_distributor(data, parent_id)?;
        if let Err(e) = self.store.save(self.tree.records()) {
            warn!("saving to {} failed, restoring previous state", self.store.location());
            self.tree.load_snapshot(previous)?;
            return Err(e);
        }
        info!("added distributor {} under {}", id, parent_id);
        Ok(id)
    }

    pub fn stats(&self) -> NetworkStats {
        let distributors = self.tree.distributors();
        let active = distributors
            .iter()
            .filter(|d| d.status.is_active())
            .count();
        let mut rank_histogram: BTreeMap<Rank, usize> =
            distributors.iter().map(|d| d.rank).counts().into_iter().collect();
        // Every rung is listed so empty ranks show up as zero
        for level in 0..self.tree.ladder().rules().len() {
            rank_histogram.entry(Rank(level)).or_insert(0);
        }

        NetworkStats {
            total_distributors: distributors.len(),
            active,
            inactive: distributors.len() - active,
            customers: self.tree.customers().len(),
            total_volume: distributors.iter().map(|d| d.personal_volume).sum(),
            rank_histogram,
            depth: self.tree.depth(),
        }
    }

    /// Personal volume of `id` plus that of its entire downline.
    pub fn group_volume(&self, id: &str) -> Option<f64> {
        let node = self.tree.find_node_by_id(id)?;
        let downline: f64 = self
            .tree
            .get_downline(id, None)
            .iter()
            .map(|d| d.personal_volume)
            .sum();
        Some(node.personal_volume + downline)
    }

    /// Group volume for every distributor, accumulated from the deepest level up.
    pub fn group_volumes(&self) -> HashMap<String, f64> {
        let mut carried: HashMap<&str, f64> = HashMap::new();
        let mut volumes = HashMap::new();

        for d in self
            .tree
            .distributors()
            .into_iter()
            .sorted_by_key(|d| std::cmp::Reverse(d.level))
        {
            let total = d.personal_volume + carried.get(d.id.as_str()).copied().unwrap_or(0.0);
            if let Some(parent) = self.tree.placement_parent(&d.id) {
                *carried.entry(parent.id.as_str()).or_default() += total;
            }
            volumes.insert(d.id.clone(), total);
        }
        volumes
    }

    /// Sponsors of `id` following enrollment lineage, nearest first.
    ///
    /// Stops at a sponsor that is not part of the snapshot or that was
    /// already visited.
    pub fn sponsor_chain(&self, id: &str) -> Vec<&Distributor> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id.to_string()]);
        let mut current = self.tree.find_node_by_id(id);

        while let Some(sponsor) = current
            .and_then(|d| d.parent_id.as_deref())
            .and_then(|sponsor_id| self.tree.find_node_by_id(sponsor_id))
        {
            if !seen.insert(sponsor.id.clone()) {
                debug!("sponsor loop at {}", sponsor.id);
                break;
            }
            chain.push(sponsor);
            current = Some(sponsor);
        }
        chain
    }

    /// One row per distributor in snapshot order.
    pub fn summaries(&self) -> Vec<DistributorSummary> {
        let volumes = self.group_volumes();
        let ladder = self.tree.ladder();
        self.tree
            .distributors()
            .into_iter()
            .map(|d| DistributorSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                status: d.status,
                rank: d.rank,
                rank_name: ladder.name(d.rank),
                level: d.level,
                recruits: d.recruits,
                personal_volume: d.personal_volume,
                group_volume: volumes.get(&d.id).copied().unwrap_or(d.personal_volume),
                customers: d.customers.len(),
            })
            .collect()
    }
}

//! Rank ladder and qualification rules

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Position on the rank ladder; `Rank(0)` is the lowest rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Rank(pub usize);

impl Rank {
    pub const LOWEST: Rank = Rank(0);

    pub fn level(self) -> usize {
        self.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {}", self.0)
    }
}

/// Qualification rule for a single rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRule {
    pub name: String,
    /// Direct children that must themselves meet the recruit minimum
    pub min_qualified_legs: usize,
    pub description: String,
}

/// The rank a distributor can reach next, with what it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextRank {
    pub rank: Rank,
    pub name: String,
    pub description: String,
}

/// Ordered rank ladder, lowest rung first.
///
/// A distributor only qualifies above the lowest rank with at least
/// `min_direct_recruits` direct children. The same minimum decides whether a
/// child counts as a qualified leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    min_direct_recruits: usize,
    rules: Vec<RankRule>,
}

pub const DEFAULT_MIN_DIRECT_RECRUITS: usize = 5;
pub const DEFAULT_LEVELS: usize = 6;

impl Default for RankLadder {
    fn default() -> Self {
        let rules = (0..DEFAULT_LEVELS).map(default_rule).collect();
        Self {
            min_direct_recruits: DEFAULT_MIN_DIRECT_RECRUITS,
            rules,
        }
    }
}

fn default_rule(level: usize) -> RankRule {
    let description = match level {
        0 => "Starting rank for every distributor".to_string(),
        1 => format!(
            "Recruit {} distributors, 1 of whom has {} recruits of their own",
            DEFAULT_MIN_DIRECT_RECRUITS, DEFAULT_MIN_DIRECT_RECRUITS
        ),
        n => format!(
            "Recruit {} distributors, {} of whom have {} recruits of their own",
            DEFAULT_MIN_DIRECT_RECRUITS, n, DEFAULT_MIN_DIRECT_RECRUITS
        ),
    };
    RankRule {
        name: format!("Level {}", level),
        min_qualified_legs: level,
        description,
    }
}

impl RankLadder {
    /// Build a validated ladder.
    ///
    /// The first rule is the lowest rank and must not require any qualified
    /// legs; leg thresholds must not decrease going up the ladder.
    pub fn new(min_direct_recruits: usize, rules: Vec<RankRule>) -> DomainResult<Self> {
        let first = rules
            .first()
            .ok_or_else(|| DomainError::InvalidRankLadder("ladder has no ranks".to_string()))?;
        if first.min_qualified_legs != 0 {
            return Err(DomainError::InvalidRankLadder(format!(
                "lowest rank '{}' must require 0 qualified legs",
                first.name
            )));
        }
        if let Some(pair) = rules
            .windows(2)
            .find(|w| w[1].min_qualified_legs < w[0].min_qualified_legs)
        {
            return Err(DomainError::InvalidRankLadder(format!(
                "rank '{}' requires fewer qualified legs than '{}'",
                pair[1].name, pair[0].name
            )));
        }
        Ok(Self {
            min_direct_recruits,
            rules,
        })
    }

    pub fn min_direct_recruits(&self) -> usize {
        self.min_direct_recruits
    }

    pub fn rules(&self) -> &[RankRule] {
        &self.rules
    }

    pub fn lowest(&self) -> Rank {
        Rank::LOWEST
    }

    pub fn top(&self) -> Rank {
        Rank(self.rules.len() - 1)
    }

    pub fn rule(&self, rank: Rank) -> Option<&RankRule> {
        self.rules.get(rank.0)
    }

    /// Display name of a rank, falling back to its level.
    pub fn name(&self, rank: Rank) -> String {
        self.rule(rank)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| rank.to_string())
    }

    /// Whether a child with `recruits` direct recruits counts as a qualified leg.
    pub fn is_qualified_leg(&self, recruits: usize) -> bool {
        recruits >= self.min_direct_recruits
    }

    /// Rank earned from the node's own recruits and its qualified legs.
    ///
    /// Inactive distributors always hold the lowest rank.
    pub fn qualify(&self, active: bool, recruits: usize, qualified_legs: usize) -> Rank {
        if !active || recruits < self.min_direct_recruits {
            return Rank::LOWEST;
        }
        self.rules
            .iter()
            .enumerate()
            .rev()
            .find(|(_, rule)| qualified_legs >= rule.min_qualified_legs)
            .map(|(level, _)| Rank(level))
            .unwrap_or(Rank::LOWEST)
    }

    /// The rung above `current`, or `None` at the top of the ladder.
    pub fn next_rank(&self, current: Rank) -> Option<NextRank> {
        let next = Rank(current.0 + 1);
        self.rule(next).map(|rule| NextRank {
            rank: next,
            name: rule.name.clone(),
            description: rule.description.clone(),
        })
    }
}

//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod entities;
pub mod error;
pub mod genealogy;
pub mod rank;

pub use arena::{TreeArena, TreeNode};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use genealogy::{GenealogyTree, RebuildSummary, RootPolicy, TreeOptions, DEFAULT_MAX_RANK_PASSES};
pub use rank::{NextRank, Rank, RankLadder, RankRule};

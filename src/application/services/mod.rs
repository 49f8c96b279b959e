//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (SnapshotStore, FileSystem)
//! but are themselves concrete structs, not traits.

mod genealogy;

pub use genealogy::{DistributorSummary, GenealogyService, NetworkStats};

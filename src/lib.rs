//! Network-marketing genealogy: placement tree assembly, rank qualification
//! and downline queries over a distributor snapshot.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

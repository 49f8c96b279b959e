//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Network-marketing genealogy: placement tree, ranks and downline queries
#[derive(Parser, Debug)]
#[command(name = "genealogy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory with a local .genealogy.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Snapshot document (overrides config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the placement tree
    Tree {
        /// Start at this distributor instead of the root
        id: Option<String>,
        /// Generations to show below the start
        #[arg(short = 'L', long)]
        depth: Option<usize>,
    },

    /// List all distributors with derived figures
    List,

    /// Show one distributor: rank, next rank, sponsors, customers
    Show {
        /// Distributor id
        id: String,
    },

    /// List descendants breadth-first
    Downline {
        /// Distributor id
        id: String,
        /// Generations to include (default: all)
        #[arg(short = 'L', long)]
        depth: Option<usize>,
    },

    /// Show the rank ladder
    Ranks,

    /// Place a new distributor under a parent
    Add {
        /// Placement parent id
        #[arg(short, long)]
        parent: String,
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
        /// Enrolling sponsor id (default: the placement parent)
        #[arg(long)]
        sponsor: Option<String>,
        /// Add as inactive
        #[arg(long)]
        inactive: bool,
        /// Own sales volume
        #[arg(long, default_value_t = 0.0)]
        volume: f64,
    },

    /// Network totals and rank histogram
    Stats,

    /// Validate the snapshot structure
    Check,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print effective configuration
    Show,
    /// Print config file locations
    Path,
    /// Print a commented config template
    Template,
    /// Edit the local (or global) config file
    Edit {
        /// Edit the global config instead of the local one
        #[arg(long)]
        global: bool,
    },
}

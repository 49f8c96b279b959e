//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/genealogy/genealogy.toml`
//! 3. Local config: `<dir>/.genealogy.toml` (working directory by default)
//! 4. Environment variables: `GENEALOGY_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{RankLadder, RankRule, RootPolicy, TreeOptions, DEFAULT_MAX_RANK_PASSES};
use crate::util::path::expand_env_vars;

/// One rung of the rank ladder as written in config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankLevelConfig {
    pub name: String,
    pub min_qualified_legs: usize,
    #[serde(default)]
    pub description: String,
}

/// Rank qualification rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RanksConfig {
    /// Direct recruits needed to rank above the lowest level and to count as a qualified leg
    pub min_direct_recruits: usize,
    /// Ladder rungs, lowest first
    pub levels: Vec<RankLevelConfig>,
}

impl Default for RanksConfig {
    fn default() -> Self {
        let ladder = RankLadder::default();
        Self {
            min_direct_recruits: ladder.min_direct_recruits(),
            levels: ladder
                .rules()
                .iter()
                .map(|r| RankLevelConfig {
                    name: r.name.clone(),
                    min_qualified_legs: r.min_qualified_legs,
                    description: r.description.clone(),
                })
                .collect(),
        }
    }
}

/// Raw ranks config for intermediate parsing (Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRanksConfig {
    pub min_direct_recruits: Option<usize>,
    pub levels: Option<Vec<RankLevelConfig>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub snapshot_path: Option<PathBuf>,
    pub max_rank_passes: Option<usize>,
    pub root_policy: Option<RootPolicy>,
    pub ranks: RawRanksConfig,
}

impl RanksConfig {
    /// Merge overlay onto self. A layer that lists levels replaces the whole ladder.
    pub fn merge(&self, overlay: &RawRanksConfig) -> Self {
        Self {
            min_direct_recruits: overlay
                .min_direct_recruits
                .unwrap_or(self.min_direct_recruits),
            levels: overlay
                .levels
                .clone()
                .unwrap_or_else(|| self.levels.clone()),
        }
    }
}

/// Unified configuration for genealogy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Snapshot document (default: ~/.genealogy/snapshot.json)
    pub snapshot_path: PathBuf,
    /// Rank recomputation passes before giving up on convergence
    pub max_rank_passes: usize,
    /// Handling of snapshots with several unplaced distributors
    pub root_policy: RootPolicy,
    /// Rank ladder
    pub ranks: RanksConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_path: default_base_dir().join("snapshot.json"),
            max_rank_passes: DEFAULT_MAX_RANK_PASSES,
            root_policy: RootPolicy::default(),
            ranks: RanksConfig::default(),
        }
    }
}

/// Get the default base directory (~/.genealogy).
fn default_base_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".genealogy"))
        .unwrap_or_else(|| PathBuf::from("~/.genealogy"))
}

/// Get the XDG config directory for genealogy.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "genealogy").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("genealogy.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".genealogy.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.snapshot_path.to_string_lossy().as_ref());
        self.snapshot_path = PathBuf::from(expanded);
    }

    /// Merge overlay config onto self (base): overlay wins where specified.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            snapshot_path: overlay
                .snapshot_path
                .clone()
                .unwrap_or_else(|| self.snapshot_path.clone()),
            max_rank_passes: overlay.max_rank_passes.unwrap_or(self.max_rank_passes),
            root_policy: overlay.root_policy.unwrap_or(self.root_policy),
            ranks: self.ranks.merge(&overlay.ranks),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Directory holding an optional `.genealogy.toml`
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/genealogy/genealogy.toml`
    /// 3. Local config: `<local_dir>/.genealogy.toml`
    /// 4. Environment variables: `GENEALOGY_*` prefix
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply GENEALOGY_* environment variables as explicit overrides.
    ///
    /// Nested keys use a double underscore: `GENEALOGY_RANKS__MIN_DIRECT_RECRUITS`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("GENEALOGY")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("snapshot_path") {
            settings.snapshot_path = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("max_rank_passes") {
            settings.max_rank_passes = val.parse().map_err(|_| ApplicationError::Config {
                message: format!("GENEALOGY_MAX_RANK_PASSES is not a number: {}", val),
            })?;
        }
        if let Ok(val) = config.get_string("root_policy") {
            settings.root_policy = parse_root_policy(&val)?;
        }
        if let Ok(val) = config.get_string("ranks.min_direct_recruits") {
            settings.ranks.min_direct_recruits =
                val.parse().map_err(|_| ApplicationError::Config {
                    message: format!(
                        "GENEALOGY_RANKS__MIN_DIRECT_RECRUITS is not a number: {}",
                        val
                    ),
                })?;
        }

        Ok(settings)
    }

    /// Reject settings the tree manager cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.max_rank_passes == 0 {
            return Err(ApplicationError::Config {
                message: "max_rank_passes must be at least 1".to_string(),
            });
        }
        self.rank_ladder().map(|_| ())
    }

    /// Build the validated rank ladder.
    pub fn rank_ladder(&self) -> Result<RankLadder, ApplicationError> {
        let rules = self
            .ranks
            .levels
            .iter()
            .map(|l| RankRule {
                name: l.name.clone(),
                min_qualified_legs: l.min_qualified_legs,
                description: l.description.clone(),
            })
            .collect();
        RankLadder::new(self.ranks.min_direct_recruits, rules).map_err(|e| {
            ApplicationError::Config {
                message: e.to_string(),
            }
        })
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            max_rank_passes: self.max_rank_passes,
            root_policy: self.root_policy,
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# genealogy configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/genealogy/genealogy.toml
#   Local:  ./.genealogy.toml
#   Env:    GENEALOGY_* environment variables (GENEALOGY_RANKS__MIN_DIRECT_RECRUITS for nested keys)

# Snapshot document with distributors, customers and purchases
# snapshot_path = "~/.genealogy/snapshot.json"

# Rank passes per rebuild before giving up on convergence
# max_rank_passes = 15

# "first": several unplaced distributors are tolerated, the first one is the root
# "strict": several unplaced distributors are rejected
# root_policy = "first"

[ranks]
# Direct recruits needed to rank above the lowest level,
# and for a child to count as a qualified leg
# min_direct_recruits = 5

# Listing levels replaces the whole ladder; the first level must require 0 legs
# [[ranks.levels]]
# name = "Level 0"
# min_qualified_legs = 0
# description = "Starting rank for every distributor"
#
# [[ranks.levels]]
# name = "Level 1"
# min_qualified_legs = 1
# description = "Recruit 5 distributors, 1 of whom has 5 recruits of their own"
"#
        .to_string()
    }
}

fn parse_root_policy(value: &str) -> Result<RootPolicy, ApplicationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "first" => Ok(RootPolicy::First),
        "strict" => Ok(RootPolicy::Strict),
        other => Err(ApplicationError::Config {
            message: format!("unknown root_policy: {other} (expected first or strict)"),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

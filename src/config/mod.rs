//! # Configuration Management Module
//!
//! TOML configuration for the invkeeper service: storage location, engine
//! tuning, logging, and the ordered list of inventory groups.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [service]
//! data_dir = "./data"
//! storage_timeout_ms = 5000
//! max_queued_ops = 8
//! notify_players = true
//!
//! [logging]
//! level = "info"
//!
//! [[groups]]
//! name = "survival"
//! default = true
//! worlds = ["world", "world_nether", "world_the_end"]
//! patterns = ["world_.*"]
//! save_ender_chest = true
//!
//! [[groups]]
//! name = "creative"
//! worlds = ["creative"]
//! separate_gamemode_inventories = true
//! ```
//!
//! Groups are declared as an array of tables because declaration order is
//! semantic: pattern rules are evaluated first-match-wins in this order.
//!
//! Structural problems (bad TOML, missing sections) surface from
//! [`Config::load`]; semantic problems in the group set (duplicate world
//! claims, zero or multiple defaults, invalid patterns) surface from
//! [`Config::build_registry`] and are fatal at startup.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::groups::{GroupDefinition, GroupRegistry, GroupSettings};
use crate::sync::SyncConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub data_dir: String,
    /// Upper bound on each blocking storage step, in milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Per-player bound on operations queued behind the in-flight one.
    #[serde(default = "default_max_queued_ops")]
    pub max_queued_ops: usize,
    /// Send chat confirmations on completed saves and loads.
    #[serde(default = "default_notify_players")]
    pub notify_players: bool,
    /// Backup archive directory; defaults to `<data_dir>-backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
}

fn default_storage_timeout_ms() -> u64 {
    5000
}

fn default_max_queued_ops() -> usize {
    8
}

fn default_notify_players() -> bool {
    true
}

impl ServiceConfig {
    pub fn backup_dir(&self) -> String {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| format!("{}-backups", self.data_dir))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// One `[[groups]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub worlds: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub separate_gamemode_inventories: bool,
    #[serde(default = "default_save_ender_chest")]
    pub save_ender_chest: bool,
    #[serde(default = "default_spectator_shares_survival")]
    pub spectator_shares_survival: bool,
}

fn default_save_ender_chest() -> bool {
    true
}

fn default_spectator_shares_survival() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Map the `[[groups]]` entries onto registry input, preserving order.
    pub fn group_definitions(&self) -> Vec<GroupDefinition> {
        self.groups
            .iter()
            .map(|g| GroupDefinition {
                name: g.name.clone(),
                is_default: g.default,
                worlds: g.worlds.clone(),
                patterns: g.patterns.clone(),
                settings: GroupSettings {
                    separate_gamemode_inventories: g.separate_gamemode_inventories,
                    save_ender_chest: g.save_ender_chest,
                    spectator_shares_survival: g.spectator_shares_survival,
                },
            })
            .collect()
    }

    /// Build and validate the group registry. Any registry error here is a
    /// configuration error and the service must refuse to start.
    pub fn build_registry(&self) -> Result<GroupRegistry> {
        GroupRegistry::new(self.group_definitions())
            .map_err(|e| anyhow!("Invalid group configuration: {}", e))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            storage_timeout_ms: self.service.storage_timeout_ms,
            max_queued_ops: self.service.max_queued_ops,
            notify_players: self.service.notify_players,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: ServiceConfig {
                data_dir: "./data".to_string(),
                storage_timeout_ms: default_storage_timeout_ms(),
                max_queued_ops: default_max_queued_ops(),
                notify_players: true,
                backup_dir: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("invkeeper.log".to_string()),
            },
            groups: vec![
                GroupConfig {
                    name: "survival".to_string(),
                    default: true,
                    worlds: vec![
                        "world".to_string(),
                        "world_nether".to_string(),
                        "world_the_end".to_string(),
                    ],
                    patterns: Vec::new(),
                    separate_gamemode_inventories: false,
                    save_ender_chest: true,
                    spectator_shares_survival: true,
                },
                GroupConfig {
                    name: "creative".to_string(),
                    default: false,
                    worlds: vec!["creative".to_string()],
                    patterns: vec!["creative_.*".to_string()],
                    separate_gamemode_inventories: false,
                    save_ender_chest: false,
                    spectator_shares_survival: true,
                },
            ],
        }
    }
}

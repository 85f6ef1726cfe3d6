//! # Invkeeper - Per-Group Inventory Synchronization for Multi-World Game Servers
//!
//! Invkeeper partitions a server's worlds into named inventory groups and
//! swaps each player's carried items, armor, off-hand, and ender-chest
//! contents as they cross between groups. Snapshots are persisted per
//! (player, group, bucket) in an embedded sled database; a single authority
//! task owns all live-player mutation so nobody ever sees a half-applied
//! inventory.
//!
//! ## Features
//!
//! - **Group Resolution**: Worlds map to groups by explicit membership,
//!   then pattern rules in declared order, then a guaranteed default group.
//! - **Serialized Synchronization**: Per-player FIFO operation queues;
//!   captures and applies run only on the authority task, storage I/O only
//!   on blocking workers with a bounded timeout.
//! - **Versioned Snapshots**: Bincode records with a schema version tag and
//!   a CRC32 payload guard; corruption is reported, never papered over.
//! - **Game-Mode Buckets**: Optional per-group separation of inventories by
//!   game mode, with a configurable spectator folding rule.
//! - **Operator Tooling**: CLI for config validation, data inspection, and
//!   tar.gz backup/restore with SHA256 verification.
//! - **Async Design**: Built with Tokio; the engine embeds in a host
//!   server's runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use invkeeper::config::Config;
//! use invkeeper::storage::SledSnapshotStore;
//! use invkeeper::sync::{start_synchronizer, LoadReason};
//! # use invkeeper::sync::player::PlayerDirectory;
//! # fn directory() -> Box<dyn PlayerDirectory> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("invkeeper.toml").await?;
//!     let registry = Arc::new(config.build_registry()?);
//!     let store = Arc::new(SledSnapshotStore::open(&config.service.data_dir)?);
//!
//!     let sync = start_synchronizer(config.sync_config(), registry, store, directory());
//!
//!     let player = uuid::Uuid::new_v4();
//!     sync.save_inventory(player).await?;
//!     sync.load_inventory(player, "creative", LoadReason::WorldChange).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`groups`] - World-to-group resolution rules and the reloadable registry
//! - [`snapshot`] - Snapshot data model, keys, and game-mode buckets
//! - [`storage`] - Snapshot persistence trait, sled backend, and backups
//! - [`sync`] - The synchronization engine and its capability boundary
//! - [`config`] - Configuration management and validation
//! - [`metrics`] - Process-local operation counters
//! - [`validation`] - Group-name and world-id validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Game Server    │───→│  Synchronizer   │───→│  SnapshotStore  │
//! │  (live players) │    │  (authority)    │    │  (sled)         │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!                               │
//!                        ┌─────────────────┐
//!                        │  GroupRegistry  │
//!                        └─────────────────┘
//! ```

pub mod config;
pub mod groups;
pub mod logutil;
pub mod metrics;
pub mod snapshot;
pub mod storage;
pub mod sync;
pub mod validation;

pub use groups::{Group, GroupRegistry, GroupSettings, RegistryError};
pub use snapshot::{
    GameMode, InventoryBucket, InventorySnapshot, ItemStack, SnapshotKey, Slot,
};
pub use storage::{SledSnapshotStore, SnapshotStore, StoreError};
pub use sync::recent::{RecentLookupCache, RecentLookupEntry, RECENT_LOOKUP_LIMIT};
pub use sync::{
    start_synchronizer, InventorySynchronizer, LoadOutcome, LoadReason, SaveOutcome, SyncConfig,
    SyncError,
};

//! Inventory synchronization engine.
//!
//! A single spawned task (the authority task) owns every live-player read
//! and write. Callers talk to it through [`InventorySynchronizer`], a cheap
//! clonable handle over an mpsc command channel; results come back on
//! oneshot channels.
//!
//! Each operation moves through a small state machine per player:
//!
//! * save: Capturing (on the authority task) then Persisting (blocking
//!   store write on a worker) then Completed or Failed
//! * load: Persisting (blocking store read on a worker) then Applying
//!   (on the authority task) then Completed or Failed
//!
//! While an operation is in flight for a player, further requests for the
//! same player queue FIFO behind it up to a configured bound. Operations on
//! different players overlap freely at the storage layer. Capturing and
//! Applying never await; Persisting is the only phase allowed to block, and
//! it runs on `spawn_blocking` under a timeout with its completion sent
//! back into the command channel as an explicit message.
//!
//! Failure is terminal per attempt and leaves live state unchanged: a
//! failed save does not touch storage partially, and a failed load looks
//! identical to no load at all. Retry policy belongs to the caller.

pub mod player;
pub mod recent;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::groups::{Group, GroupRegistry};
use crate::logutil::{escape_log, short_uuid};
use crate::metrics;
use crate::snapshot::{InventoryBucket, InventorySnapshot, SnapshotKey};
use crate::storage::{SnapshotStore, StoreError};
use player::{InventoryContents, PlayerDirectory};

/// Why a load was triggered. Observability only; it does not change the
/// load's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadReason {
    Login,
    WorldChange,
    Command,
    Autosave,
}

impl LoadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadReason::Login => "login",
            LoadReason::WorldChange => "world-change",
            LoadReason::Command => "command",
            LoadReason::Autosave => "autosave",
        }
    }
}

impl fmt::Display for LoadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to operation initiators.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Live-state steps need an online player; persisted identity alone is
    /// not enough to capture or apply an inventory.
    #[error("player {0} is not online")]
    PlayerOffline(Uuid),

    #[error("operation queue full for player {player} (limit {limit})")]
    QueueFull { player: Uuid, limit: usize },

    #[error("storage operation timed out after {0} ms")]
    Timeout(u64),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Task join errors and other unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("synchronizer is shut down")]
    Shutdown,
}

/// Tuning knobs for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on each Persisting step, in milliseconds.
    pub storage_timeout_ms: u64,
    /// Per-player bound on queued operations behind the in-flight one.
    pub max_queued_ops: usize,
    /// Send a chat confirmation to the player on completion.
    pub notify_players: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_timeout_ms: 5000,
            max_queued_ops: 8,
            notify_players: true,
        }
    }
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub key: SnapshotKey,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub key: SnapshotKey,
    /// False when no snapshot existed and the player was cleared to empty.
    pub restored: bool,
}

enum Command {
    Save {
        player: Uuid,
        respond: oneshot::Sender<Result<SaveOutcome, SyncError>>,
    },
    Load {
        player: Uuid,
        group: String,
        reason: LoadReason,
        respond: oneshot::Sender<Result<LoadOutcome, SyncError>>,
    },
    StoreDone {
        player: Uuid,
        result: StoreResult,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

enum StoreResult {
    Saved(Result<(), SyncError>),
    Loaded(Result<Option<InventorySnapshot>, SyncError>),
}

/// A requested operation waiting for its turn on the player's queue.
enum Pending {
    Save {
        respond: oneshot::Sender<Result<SaveOutcome, SyncError>>,
    },
    Load {
        group: String,
        reason: LoadReason,
        respond: oneshot::Sender<Result<LoadOutcome, SyncError>>,
    },
}

impl Pending {
    fn fail(self, player: Uuid, err: SyncError) {
        match self {
            Pending::Save { respond } => {
                metrics::inc_save_failed();
                log::warn!(
                    "inventory save rejected for player {}: {}",
                    short_uuid(&player),
                    err
                );
                let _ = respond.send(Err(err));
            }
            Pending::Load {
                reason, respond, ..
            } => {
                metrics::record_load(reason.as_str(), false);
                log::warn!(
                    "inventory load ({}) rejected for player {}: {}",
                    reason,
                    short_uuid(&player),
                    err
                );
                let _ = respond.send(Err(err));
            }
        }
    }
}

/// The in-flight marker: at most one per player, held from the start of
/// Capturing or the read side of Persisting until Completed or Failed.
enum Active {
    Save {
        key: SnapshotKey,
        respond: oneshot::Sender<Result<SaveOutcome, SyncError>>,
    },
    Load {
        key: SnapshotKey,
        group: Arc<Group>,
        reason: LoadReason,
        respond: oneshot::Sender<Result<LoadOutcome, SyncError>>,
    },
}

impl Active {
    fn fail(self, player: Uuid, err: SyncError) {
        match self {
            Active::Save { key, respond } => {
                metrics::inc_save_failed();
                log::warn!(
                    "inventory save {} failed for player {}: {}",
                    key,
                    short_uuid(&player),
                    err
                );
                let _ = respond.send(Err(err));
            }
            Active::Load {
                key,
                reason,
                respond,
                ..
            } => {
                metrics::record_load(reason.as_str(), false);
                log::warn!(
                    "inventory load {} ({}) failed for player {}: {}",
                    key,
                    reason,
                    short_uuid(&player),
                    err
                );
                let _ = respond.send(Err(err));
            }
        }
    }
}

#[derive(Default)]
struct PlayerOps {
    active: Option<Active>,
    queue: VecDeque<Pending>,
}

enum StartResult {
    Started(Active),
    Rejected,
}

struct Engine {
    registry: Arc<GroupRegistry>,
    store: Arc<dyn SnapshotStore>,
    players: Box<dyn PlayerDirectory>,
    cfg: SyncConfig,
    tx: mpsc::UnboundedSender<Command>,
    ops: HashMap<Uuid, PlayerOps>,
}

impl Engine {
    fn submit(&mut self, player: Uuid, pending: Pending) {
        let busy = self
            .ops
            .get(&player)
            .map(|o| o.active.is_some())
            .unwrap_or(false);
        if busy {
            let limit = self.cfg.max_queued_ops;
            let ops = self.ops.entry(player).or_default();
            if ops.queue.len() >= limit {
                metrics::inc_queue_overflow();
                pending.fail(player, SyncError::QueueFull { player, limit });
            } else {
                ops.queue.push_back(pending);
            }
            return;
        }
        self.start_next(player, pending);
    }

    /// Start `pending`, falling through to queued operations when a start
    /// is rejected at the boundary (offline player, unknown group).
    fn start_next(&mut self, player: Uuid, pending: Pending) {
        let mut current = pending;
        loop {
            match self.try_start(player, current) {
                StartResult::Started(active) => {
                    self.ops.entry(player).or_default().active = Some(active);
                    return;
                }
                StartResult::Rejected => {
                    match self.ops.get_mut(&player).and_then(|o| o.queue.pop_front()) {
                        Some(next) => current = next,
                        None => {
                            self.cleanup(player);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn try_start(&mut self, player: Uuid, pending: Pending) -> StartResult {
        match pending {
            Pending::Save { respond } => {
                // Capturing: exclusive live-state read, no suspension
                let captured = match self.players.get(player) {
                    Some(live) if live.is_online() => {
                        let world = live.world();
                        let group = self.registry.resolve(&world);
                        log::debug!(
                            "capturing inventory for {} ({}) in world {}",
                            escape_log(&live.name()),
                            short_uuid(&player),
                            escape_log(&world)
                        );
                        let bucket = group.settings.bucket_for(live.game_mode());
                        let contents = live.inventory();
                        let ender = group.settings.save_ender_chest.then(|| live.ender_chest());
                        let snapshot = InventorySnapshot::new(
                            contents.main,
                            contents.armor,
                            contents.off_hand,
                            ender,
                        );
                        Some((SnapshotKey::new(player, group.name.clone(), bucket), snapshot))
                    }
                    _ => None,
                };
                let Some((key, snapshot)) = captured else {
                    Pending::Save { respond }.fail(player, SyncError::PlayerOffline(player));
                    return StartResult::Rejected;
                };
                self.spawn_save(player, key.clone(), snapshot);
                StartResult::Started(Active::Save { key, respond })
            }
            Pending::Load {
                group,
                reason,
                respond,
            } => {
                let Some(group_ref) = self.registry.get(&group) else {
                    Pending::Load {
                        group: group.clone(),
                        reason,
                        respond,
                    }
                    .fail(player, SyncError::UnknownGroup(group));
                    return StartResult::Rejected;
                };
                let bucket = match self.players.get(player) {
                    Some(live) if live.is_online() => {
                        Some(group_ref.settings.bucket_for(live.game_mode()))
                    }
                    _ => None,
                };
                let Some(bucket) = bucket else {
                    Pending::Load {
                        group,
                        reason,
                        respond,
                    }
                    .fail(player, SyncError::PlayerOffline(player));
                    return StartResult::Rejected;
                };
                let key = SnapshotKey::new(player, group_ref.name.clone(), bucket);
                self.spawn_load(player, key.clone());
                StartResult::Started(Active::Load {
                    key,
                    group: group_ref,
                    reason,
                    respond,
                })
            }
        }
    }

    /// Persisting, write side. Runs on a storage worker; completion comes
    /// back as a `StoreDone` message.
    fn spawn_save(&self, player: Uuid, key: SnapshotKey, snapshot: InventorySnapshot) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let timeout_ms = self.cfg.storage_timeout_ms;
        tokio::spawn(async move {
            let io = tokio::task::spawn_blocking(move || store.save(&key, &snapshot));
            let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), io).await {
                Err(_) => Err(SyncError::Timeout(timeout_ms)),
                Ok(Err(join)) => Err(SyncError::Internal(join.to_string())),
                Ok(Ok(outcome)) => outcome.map_err(SyncError::from),
            };
            let _ = tx.send(Command::StoreDone {
                player,
                result: StoreResult::Saved(result),
            });
        });
    }

    /// Persisting, read side.
    fn spawn_load(&self, player: Uuid, key: SnapshotKey) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let timeout_ms = self.cfg.storage_timeout_ms;
        tokio::spawn(async move {
            let io = tokio::task::spawn_blocking(move || store.load(&key));
            let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), io).await {
                Err(_) => Err(SyncError::Timeout(timeout_ms)),
                Ok(Err(join)) => Err(SyncError::Internal(join.to_string())),
                Ok(Ok(outcome)) => outcome.map_err(SyncError::from),
            };
            let _ = tx.send(Command::StoreDone {
                player,
                result: StoreResult::Loaded(result),
            });
        });
    }

    fn finish(&mut self, player: Uuid, result: StoreResult) {
        let active = self.ops.get_mut(&player).and_then(|o| o.active.take());
        let Some(active) = active else {
            log::error!(
                "storage completion for player {} with no operation in flight",
                short_uuid(&player)
            );
            return;
        };

        match (active, result) {
            (Active::Save { key, respond }, StoreResult::Saved(outcome)) => match outcome {
                Ok(()) => {
                    metrics::inc_save_completed();
                    log::info!("saved inventory {} for player {}", key, short_uuid(&player));
                    self.notify(player, &format!("Inventory saved for group {}.", key.group));
                    let _ = respond.send(Ok(SaveOutcome { key }));
                }
                Err(err) => {
                    if matches!(err, SyncError::Timeout(_)) {
                        metrics::inc_storage_timeout();
                    }
                    Active::Save { key, respond }.fail(player, err);
                }
            },
            (
                Active::Load {
                    key,
                    group,
                    reason,
                    respond,
                },
                StoreResult::Loaded(outcome),
            ) => match outcome {
                Ok(stored) => {
                    // Applying: exclusive live-state write, all slots
                    // replaced together
                    let applied = match self.players.get(player) {
                        Some(live) if live.is_online() => {
                            log::debug!(
                                "applying {} snapshot to {}",
                                key,
                                escape_log(&live.name())
                            );
                            let restored = stored.is_some();
                            let snapshot = stored.unwrap_or_else(|| {
                                InventorySnapshot::empty(group.settings.save_ender_chest)
                            });
                            let InventorySnapshot {
                                main,
                                armor,
                                off_hand,
                                ender_chest,
                                ..
                            } = snapshot;
                            live.set_inventory(InventoryContents {
                                main,
                                armor,
                                off_hand,
                            });
                            if group.settings.save_ender_chest {
                                if let Some(slots) = ender_chest {
                                    live.set_ender_chest(slots);
                                }
                            }
                            Some(restored)
                        }
                        _ => None,
                    };
                    match applied {
                        Some(restored) => {
                            metrics::record_load(reason.as_str(), true);
                            log::info!(
                                "loaded inventory {} ({}) for player {}{}",
                                key,
                                reason,
                                short_uuid(&player),
                                if restored { "" } else { ", no prior data, cleared" }
                            );
                            self.notify(
                                player,
                                &format!("Inventory loaded for group {}.", key.group),
                            );
                            let _ = respond.send(Ok(LoadOutcome { key, restored }));
                        }
                        None => {
                            Active::Load {
                                key,
                                group,
                                reason,
                                respond,
                            }
                            .fail(player, SyncError::PlayerOffline(player));
                        }
                    }
                }
                Err(err) => {
                    if matches!(err, SyncError::Timeout(_)) {
                        metrics::inc_storage_timeout();
                    }
                    Active::Load {
                        key,
                        group,
                        reason,
                        respond,
                    }
                    .fail(player, err);
                }
            },
            (orphan, _) => {
                orphan.fail(
                    player,
                    SyncError::Internal("mismatched storage completion".into()),
                );
            }
        }

        match self.ops.get_mut(&player).and_then(|o| o.queue.pop_front()) {
            Some(next) => self.start_next(player, next),
            None => self.cleanup(player),
        }
    }

    fn notify(&mut self, player: Uuid, text: &str) {
        if !self.cfg.notify_players {
            return;
        }
        if let Some(live) = self.players.get(player) {
            if live.is_online() {
                live.send_message(text);
            }
        }
    }

    fn cleanup(&mut self, player: Uuid) {
        if let Some(ops) = self.ops.get(&player) {
            if ops.active.is_none() && ops.queue.is_empty() {
                self.ops.remove(&player);
            }
        }
    }
}

/// Handle to a running synchronizer. Clonable and usable from any task;
/// every live-state step still happens on the authority task behind it.
#[derive(Clone)]
pub struct InventorySynchronizer {
    tx: mpsc::UnboundedSender<Command>,
    store: Arc<dyn SnapshotStore>,
}

/// Spawn the authority task and return its handle.
pub fn start_synchronizer(
    cfg: SyncConfig,
    registry: Arc<GroupRegistry>,
    store: Arc<dyn SnapshotStore>,
    players: Box<dyn PlayerDirectory>,
) -> InventorySynchronizer {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let handle = InventorySynchronizer {
        tx: tx.clone(),
        store: Arc::clone(&store),
    };

    let mut engine = Engine {
        registry,
        store,
        players,
        cfg,
        tx,
        ops: HashMap::new(),
    };

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Save { player, respond } => {
                    engine.submit(player, Pending::Save { respond });
                }
                Command::Load {
                    player,
                    group,
                    reason,
                    respond,
                } => {
                    engine.submit(
                        player,
                        Pending::Load {
                            group,
                            reason,
                            respond,
                        },
                    );
                }
                Command::StoreDone { player, result } => engine.finish(player, result),
                Command::Shutdown { done } => {
                    let _ = done.send(());
                    break;
                }
            }
        }
        log::debug!("inventory synchronizer loop terminated");
    });

    handle
}

impl InventorySynchronizer {
    /// Capture the player's current inventory and persist it under the
    /// group owning their current world.
    pub async fn save_inventory(&self, player: Uuid) -> Result<SaveOutcome, SyncError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Save { player, respond })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)?
    }

    /// Load the player's snapshot for `group` and apply it to their live
    /// state, clearing to empty when no snapshot exists.
    pub async fn load_inventory(
        &self,
        player: Uuid,
        group: &str,
        reason: LoadReason,
    ) -> Result<LoadOutcome, SyncError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Load {
                player,
                group: group.to_string(),
                reason,
                respond,
            })
            .map_err(|_| SyncError::Shutdown)?;
        rx.await.map_err(|_| SyncError::Shutdown)?
    }

    /// Whether any snapshot exists for (player, group), regardless of
    /// bucket. Pure storage probe: no live state, no queueing, safe from
    /// any task whether or not the player is online.
    pub async fn has_data(&self, player: Uuid, group: &str) -> Result<bool, SyncError> {
        let store = Arc::clone(&self.store);
        let group = group.to_string();
        tokio::task::spawn_blocking(move || {
            for bucket in InventoryBucket::all() {
                if store.exists(&SnapshotKey::new(player, group.clone(), bucket))? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
        .map_err(|e| SyncError::Internal(e.to_string()))?
        .map_err(SyncError::Store)
    }

    /// Every player with stored data, from storage key enumeration.
    pub async fn all_player_uuids(&self) -> Result<Vec<Uuid>, SyncError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.player_ids())
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))?
            .map_err(SyncError::Store)
    }

    /// Stop the authority task. Outstanding queued operations are dropped;
    /// their initiators see `Shutdown`.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reason_tags_are_stable() {
        assert_eq!(LoadReason::Login.as_str(), "login");
        assert_eq!(LoadReason::WorldChange.as_str(), "world-change");
        assert_eq!(LoadReason::Command.as_str(), "command");
        assert_eq!(LoadReason::Autosave.as_str(), "autosave");
    }

    #[test]
    fn sync_config_defaults() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.storage_timeout_ms, 5000);
        assert_eq!(cfg.max_queued_ops, 8);
        assert!(cfg.notify_players);
    }

    #[test]
    fn handle_reports_shutdown_once_stopped() {
        use crate::groups::{GroupDefinition, GroupSettings};
        use crate::storage::SledSnapshotStore;

        struct NoPlayers;
        impl PlayerDirectory for NoPlayers {
            fn get(&mut self, _id: Uuid) -> Option<&mut dyn player::LivePlayer> {
                None
            }
        }

        tokio_test::block_on(async {
            let dir = tempfile::TempDir::new().expect("tempdir");
            let registry = Arc::new(
                GroupRegistry::new(vec![GroupDefinition {
                    name: "lobby".to_string(),
                    is_default: true,
                    worlds: Vec::new(),
                    patterns: Vec::new(),
                    settings: GroupSettings::default(),
                }])
                .expect("registry"),
            );
            let store = Arc::new(SledSnapshotStore::open(dir.path()).expect("store"));
            let sync =
                start_synchronizer(SyncConfig::default(), registry, store, Box::new(NoPlayers));

            sync.shutdown().await;
            let result = sync.save_inventory(Uuid::new_v4()).await;
            assert!(matches!(result, Err(SyncError::Shutdown)));
        });
    }
}

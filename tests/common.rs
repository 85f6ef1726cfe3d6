//! Test utilities & fixtures.
//! Fake live-player and directory implementations plus store wrappers used
//! across the integration suite. Each test binary pulls in the subset it
//! needs.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use invkeeper::groups::{GroupDefinition, GroupSettings};
use invkeeper::snapshot::{
    GameMode, InventorySnapshot, ItemStack, SnapshotKey, Slot, ARMOR_SLOTS, ENDER_CHEST_SLOTS,
    MAIN_SLOTS,
};
use invkeeper::storage::{SnapshotStore, StoreError};
use invkeeper::sync::player::{InventoryContents, LivePlayer, PlayerDirectory};

#[derive(Debug, Clone)]
pub struct FakePlayerState {
    pub name: String,
    pub world: String,
    pub game_mode: GameMode,
    pub online: bool,
    pub inventory: InventoryContents,
    pub ender_chest: Vec<Slot>,
    pub messages: Vec<String>,
}

/// Shared-handle fake player: the test keeps one clone for assertions while
/// the directory owns another driving the engine.
#[derive(Clone)]
pub struct FakePlayer {
    id: Uuid,
    state: Arc<Mutex<FakePlayerState>>,
}

impl FakePlayer {
    pub fn new(name: &str, world: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(FakePlayerState {
                name: name.to_string(),
                world: world.to_string(),
                game_mode: GameMode::Survival,
                online: true,
                inventory: empty_contents(),
                ender_chest: vec![None; ENDER_CHEST_SLOTS],
                messages: Vec::new(),
            })),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn snapshot_state(&self) -> FakePlayerState {
        self.state.lock().expect("player state").clone()
    }

    pub fn set_world(&self, world: &str) {
        self.state.lock().expect("player state").world = world.to_string();
    }

    pub fn set_game_mode(&self, mode: GameMode) {
        self.state.lock().expect("player state").game_mode = mode;
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().expect("player state").online = online;
    }

    pub fn give(&self, slot: usize, item: ItemStack) {
        self.state.lock().expect("player state").inventory.main[slot] = Some(item);
    }

    pub fn give_ender(&self, slot: usize, item: ItemStack) {
        self.state.lock().expect("player state").ender_chest[slot] = Some(item);
    }

    pub fn clear_carried(&self) {
        let mut state = self.state.lock().expect("player state");
        state.inventory = empty_contents();
        state.ender_chest = vec![None; ENDER_CHEST_SLOTS];
    }

    pub fn carried_items(&self) -> Vec<ItemStack> {
        let state = self.state.lock().expect("player state");
        state
            .inventory
            .main
            .iter()
            .chain(state.inventory.armor.iter())
            .chain(std::iter::once(&state.inventory.off_hand))
            .flatten()
            .cloned()
            .collect()
    }
}

pub fn empty_contents() -> InventoryContents {
    InventoryContents {
        main: vec![None; MAIN_SLOTS],
        armor: vec![None; ARMOR_SLOTS],
        off_hand: None,
    }
}

impl LivePlayer for FakePlayer {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> String {
        self.state.lock().expect("player state").name.clone()
    }

    fn world(&self) -> String {
        self.state.lock().expect("player state").world.clone()
    }

    fn game_mode(&self) -> GameMode {
        self.state.lock().expect("player state").game_mode
    }

    fn is_online(&self) -> bool {
        self.state.lock().expect("player state").online
    }

    fn inventory(&self) -> InventoryContents {
        self.state.lock().expect("player state").inventory.clone()
    }

    fn ender_chest(&self) -> Vec<Slot> {
        self.state.lock().expect("player state").ender_chest.clone()
    }

    fn set_inventory(&mut self, contents: InventoryContents) {
        self.state.lock().expect("player state").inventory = contents;
    }

    fn set_ender_chest(&mut self, slots: Vec<Slot>) {
        self.state.lock().expect("player state").ender_chest = slots;
    }

    fn send_message(&mut self, text: &str) {
        self.state
            .lock()
            .expect("player state")
            .messages
            .push(text.to_string());
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    players: HashMap<Uuid, FakePlayer>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, player: &FakePlayer) {
        self.players.insert(player.uuid(), player.clone());
    }
}

impl PlayerDirectory for FakeDirectory {
    fn get(&mut self, id: Uuid) -> Option<&mut dyn LivePlayer> {
        self.players.get_mut(&id).map(|p| p as &mut dyn LivePlayer)
    }
}

pub fn stack(item: &str, count: u32) -> ItemStack {
    ItemStack::new(item, count)
}

pub fn group_def(
    name: &str,
    default: bool,
    worlds: &[&str],
    patterns: &[&str],
) -> GroupDefinition {
    GroupDefinition {
        name: name.to_string(),
        is_default: default,
        worlds: worlds.iter().map(|s| s.to_string()).collect(),
        patterns: patterns.iter().map(|s| s.to_string()).collect(),
        settings: GroupSettings::default(),
    }
}

/// Two-group layout used by several scenarios: "survival" owns
/// the overworld and nether, "lobby" is the default catch-all.
pub fn survival_and_lobby() -> Vec<GroupDefinition> {
    vec![
        group_def("survival", false, &["world", "world_nether"], &[]),
        group_def("lobby", true, &[], &[]),
    ]
}

/// Store wrapper that sleeps inside every blocking call, widening race
/// windows for serialization tests.
pub struct DelayStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> DelayStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<S: SnapshotStore> SnapshotStore for DelayStore<S> {
    fn load(&self, key: &SnapshotKey) -> Result<Option<InventorySnapshot>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.load(key)
    }

    fn save(&self, key: &SnapshotKey, snapshot: &InventorySnapshot) -> Result<(), StoreError> {
        std::thread::sleep(self.delay);
        self.inner.save(key, snapshot)
    }

    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        self.inner.exists(key)
    }

    fn list_keys(
        &self,
        predicate: &dyn Fn(&SnapshotKey) -> bool,
    ) -> Result<Vec<SnapshotKey>, StoreError> {
        self.inner.list_keys(predicate)
    }
}

/// Store wrapper whose reads always report corruption.
pub struct CorruptReadStore<S> {
    inner: S,
}

impl<S> CorruptReadStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: SnapshotStore> SnapshotStore for CorruptReadStore<S> {
    fn load(&self, key: &SnapshotKey) -> Result<Option<InventorySnapshot>, StoreError> {
        Err(StoreError::Corrupt {
            key: key.encode(),
            detail: "injected corruption".to_string(),
        })
    }

    fn save(&self, key: &SnapshotKey, snapshot: &InventorySnapshot) -> Result<(), StoreError> {
        self.inner.save(key, snapshot)
    }

    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        self.inner.exists(key)
    }

    fn list_keys(
        &self,
        predicate: &dyn Fn(&SnapshotKey) -> bool,
    ) -> Result<Vec<SnapshotKey>, StoreError> {
        self.inner.list_keys(predicate)
    }
}

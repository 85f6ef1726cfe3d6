//! Round-trip and enumeration laws for the sled-backed snapshot store,
//! exercised through the public `SnapshotStore` trait.
mod common;

use common::*;
use invkeeper::snapshot::{GameMode, InventoryBucket, InventorySnapshot, SnapshotKey};
use invkeeper::storage::{SledSnapshotStore, SnapshotStore};
use tempfile::TempDir;
use uuid::Uuid;

fn loaded_snapshot() -> InventorySnapshot {
    let mut snap = InventorySnapshot::empty(true);
    snap.main[0] = Some(stack("iron_sword", 1));
    snap.main[35] = Some(stack("oak_log", 43));
    snap.armor[1] = Some(stack("iron_chestplate", 1));
    snap.off_hand = Some(stack("shield", 1));
    if let Some(ender) = snap.ender_chest.as_mut() {
        ender[0] = Some(stack("diamond", 5));
    }
    snap
}

#[test]
fn save_then_load_yields_an_equal_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    let store = SledSnapshotStore::open(dir.path()).expect("store");
    let key = SnapshotKey::new(Uuid::new_v4(), "survival", InventoryBucket::Shared);
    let snap = loaded_snapshot();

    store.save(&key, &snap).expect("save");
    let loaded = store.load(&key).expect("load").expect("present");
    assert_eq!(loaded, snap);
}

#[test]
fn buckets_address_distinct_records() {
    let dir = TempDir::new().expect("tempdir");
    let store = SledSnapshotStore::open(dir.path()).expect("store");
    let player = Uuid::new_v4();

    let survival_key = SnapshotKey::new(
        player,
        "build",
        InventoryBucket::Mode(GameMode::Survival),
    );
    let creative_key = SnapshotKey::new(
        player,
        "build",
        InventoryBucket::Mode(GameMode::Creative),
    );

    let mut survival = InventorySnapshot::empty(false);
    survival.main[0] = Some(stack("stone_sword", 1));
    let mut creative = InventorySnapshot::empty(false);
    creative.main[0] = Some(stack("diamond_block", 64));

    store.save(&survival_key, &survival).expect("save");
    store.save(&creative_key, &creative).expect("save");

    assert_eq!(
        store.load(&survival_key).expect("load").expect("present"),
        survival
    );
    assert_eq!(
        store.load(&creative_key).expect("load").expect("present"),
        creative
    );
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let key = SnapshotKey::new(Uuid::new_v4(), "survival", InventoryBucket::Shared);
    let snap = loaded_snapshot();

    {
        let store = SledSnapshotStore::open(dir.path()).expect("store");
        store.save(&key, &snap).expect("save");
    }

    let store = SledSnapshotStore::open(dir.path()).expect("reopen");
    let loaded = store.load(&key).expect("load").expect("present");
    assert_eq!(loaded, snap);
    assert!(store.exists(&key).expect("exists"));
}

#[test]
fn player_enumeration_deduplicates_groups() {
    let dir = TempDir::new().expect("tempdir");
    let store = SledSnapshotStore::open(dir.path()).expect("store");
    let player = Uuid::new_v4();

    for group in ["survival", "creative", "lobby"] {
        let key = SnapshotKey::new(player, group, InventoryBucket::Shared);
        store.save(&key, &loaded_snapshot()).expect("save");
    }

    let ids = store.player_ids().expect("player ids");
    assert_eq!(ids, vec![player]);

    let survival_only = store
        .list_keys(&|k| k.group == "survival")
        .expect("list");
    assert_eq!(survival_only.len(), 1);
}

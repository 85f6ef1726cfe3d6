//! Snapshot data model: the durable representation of one player's inventory
//! for one group, plus the addressing types used to store and enumerate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// Slot counts for a standard player. Applied when clearing a player to an
/// empty inventory so the applied shape matches a captured one.
pub const MAIN_SLOTS: usize = 36;
pub const ARMOR_SLOTS: usize = 4;
pub const ENDER_CHEST_SLOTS: usize = 27;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            other => Err(format!("unknown game mode: {}", other)),
        }
    }
}

/// Which partition of a group's inventory space a snapshot belongs to.
///
/// Groups that do not separate game-mode inventories store everything under
/// `Shared`; otherwise each mode gets its own bucket (subject to the group's
/// spectator folding rule).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InventoryBucket {
    Shared,
    Mode(GameMode),
}

impl InventoryBucket {
    /// Every bucket a (player, group) pair could have data under.
    pub fn all() -> [InventoryBucket; 5] {
        [
            InventoryBucket::Shared,
            InventoryBucket::Mode(GameMode::Survival),
            InventoryBucket::Mode(GameMode::Creative),
            InventoryBucket::Mode(GameMode::Adventure),
            InventoryBucket::Mode(GameMode::Spectator),
        ]
    }

    pub fn as_key_segment(&self) -> &'static str {
        match self {
            InventoryBucket::Shared => "shared",
            InventoryBucket::Mode(mode) => mode.as_str(),
        }
    }

    pub fn parse_segment(segment: &str) -> Option<InventoryBucket> {
        match segment {
            "shared" => Some(InventoryBucket::Shared),
            other => other.parse::<GameMode>().ok().map(InventoryBucket::Mode),
        }
    }
}

impl fmt::Display for InventoryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key_segment())
    }
}

/// One stack of items occupying a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
    #[serde(default)]
    pub damage: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enchantments: BTreeMap<String, u8>,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
            damage: 0,
            display_name: None,
            enchantments: BTreeMap::new(),
        }
    }
}

/// A slot either holds a stack or is empty.
pub type Slot = Option<ItemStack>;

/// Full addressing tuple for one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub player: Uuid,
    pub group: String,
    pub bucket: InventoryBucket,
}

impl SnapshotKey {
    pub fn new(player: Uuid, group: impl Into<String>, bucket: InventoryBucket) -> Self {
        Self {
            player,
            group: group.into(),
            bucket,
        }
    }

    /// Stable string encoding used for storage keys. Group names are
    /// validated to exclude `:` so the encoding splits unambiguously.
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.player, self.group, self.bucket)
    }

    pub fn parse(encoded: &str) -> Option<SnapshotKey> {
        let mut parts = encoded.splitn(3, ':');
        let player = Uuid::parse_str(parts.next()?).ok()?;
        let group = parts.next()?;
        let bucket = InventoryBucket::parse_segment(parts.next()?)?;
        if group.is_empty() {
            return None;
        }
        Some(SnapshotKey::new(player, group, bucket))
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// The durable, versioned value stored per effective key. Writers always
/// replace the whole snapshot; there are no partial-slot updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySnapshot {
    pub schema_version: u8,
    pub main: Vec<Slot>,
    pub armor: Vec<Slot>,
    pub off_hand: Slot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ender_chest: Option<Vec<Slot>>,
    pub captured_at: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn new(
        main: Vec<Slot>,
        armor: Vec<Slot>,
        off_hand: Slot,
        ender_chest: Option<Vec<Slot>>,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            main,
            armor,
            off_hand,
            ender_chest,
            captured_at: Utc::now(),
        }
    }

    /// An all-empty snapshot in the standard player shape. Applied when a
    /// player enters a group with no stored data, so nothing leaks across
    /// group boundaries.
    pub fn empty(include_ender_chest: bool) -> Self {
        Self::new(
            vec![None; MAIN_SLOTS],
            vec![None; ARMOR_SLOTS],
            None,
            include_ender_chest.then(|| vec![None; ENDER_CHEST_SLOTS]),
        )
    }

    /// Number of occupied slots across all sections.
    pub fn occupied_slots(&self) -> usize {
        let ender = self
            .ender_chest
            .as_deref()
            .map(|slots| slots.iter().filter(|s| s.is_some()).count())
            .unwrap_or(0);
        self.main.iter().filter(|s| s.is_some()).count()
            + self.armor.iter().filter(|s| s.is_some()).count()
            + usize::from(self.off_hand.is_some())
            + ender
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_slots() == 0
    }
}

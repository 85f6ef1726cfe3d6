//! # Storage Module - Snapshot Persistence Layer
//!
//! Durable persistence for inventory snapshots, keyed by
//! (player, group, bucket). The engine only depends on the [`SnapshotStore`]
//! trait; [`SledSnapshotStore`] is the default embedded backend.
//!
//! Records are bincode-encoded inside a small envelope carrying the schema
//! version and a CRC32 of the payload. A record that fails the CRC, fails to
//! decode, or carries an unexpected schema version surfaces as
//! [`StoreError::Corrupt`] - it is never silently coerced into an empty
//! inventory.
//!
//! All methods may block on I/O and must be called off the authority task
//! (the synchronizer wraps them in `spawn_blocking`).

pub mod backup;

use crc::{Crc, CRC_32_ISO_HDLC};
use sled::IVec;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::snapshot::{InventorySnapshot, SnapshotKey, SNAPSHOT_SCHEMA_VERSION};

const TREE_SNAPSHOTS: &str = "inventories";
const KEY_PREFIX: &str = "snap:";

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Errors that can arise while interacting with the snapshot storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or failing; wrapper around sled's error type.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sled::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a snapshot for write failed.
    #[error("serialization error: {0}")]
    Encode(bincode::Error),

    /// Stored record failed its CRC, failed to decode, or carried an
    /// unexpected schema version.
    #[error("corrupt record for {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

/// Durable key-value persistence of inventory snapshots.
///
/// Implementations must make `save` atomic from the caller's view: a
/// concurrent `load` sees either the previous record or the new one, never
/// a torn write.
pub trait SnapshotStore: Send + Sync {
    /// Read a snapshot. Absence is not an error.
    fn load(&self, key: &SnapshotKey) -> Result<Option<InventorySnapshot>, StoreError>;

    /// Durable whole-record upsert.
    fn save(&self, key: &SnapshotKey, snapshot: &InventorySnapshot) -> Result<(), StoreError>;

    /// Existence check without full deserialization.
    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError>;

    /// Enumerate stored keys matching a predicate.
    fn list_keys(
        &self,
        predicate: &dyn Fn(&SnapshotKey) -> bool,
    ) -> Result<Vec<SnapshotKey>, StoreError>;

    /// Every player with at least one stored snapshot, deduplicated.
    fn player_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let keys = self.list_keys(&|_| true)?;
        let ids: BTreeSet<Uuid> = keys.into_iter().map(|k| k.player).collect();
        Ok(ids.into_iter().collect())
    }
}

/// Envelope around the bincode payload of one snapshot.
#[derive(serde::Serialize, serde::Deserialize)]
struct RecordEnvelope {
    schema_version: u8,
    checksum: u32,
    payload: Vec<u8>,
}

/// Sled-backed persistence for inventory snapshots.
pub struct SledSnapshotStore {
    _db: sled::Db,
    snapshots: sled::Tree,
}

impl SledSnapshotStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let snapshots = db.open_tree(TREE_SNAPSHOTS)?;
        Ok(Self {
            _db: db,
            snapshots,
        })
    }

    fn storage_key(key: &SnapshotKey) -> Vec<u8> {
        format!("{}{}", KEY_PREFIX, key.encode()).into_bytes()
    }

    fn corrupt(key: &SnapshotKey, detail: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            key: key.encode(),
            detail: detail.into(),
        }
    }

    fn decode(key: &SnapshotKey, bytes: IVec) -> Result<InventorySnapshot, StoreError> {
        let envelope: RecordEnvelope = bincode::deserialize(&bytes)
            .map_err(|e| Self::corrupt(key, format!("envelope decode failed: {}", e)))?;
        if envelope.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Self::corrupt(
                key,
                format!(
                    "schema version {} (expected {})",
                    envelope.schema_version, SNAPSHOT_SCHEMA_VERSION
                ),
            ));
        }
        let computed = CRC32.checksum(&envelope.payload);
        if computed != envelope.checksum {
            return Err(Self::corrupt(
                key,
                format!(
                    "checksum mismatch: stored {:08x}, computed {:08x}",
                    envelope.checksum, computed
                ),
            ));
        }
        let snapshot: InventorySnapshot = bincode::deserialize(&envelope.payload)
            .map_err(|e| Self::corrupt(key, format!("payload decode failed: {}", e)))?;
        Ok(snapshot)
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn load(&self, key: &SnapshotKey) -> Result<Option<InventorySnapshot>, StoreError> {
        let Some(bytes) = self.snapshots.get(Self::storage_key(key))? else {
            return Ok(None);
        };
        Self::decode(key, bytes).map(Some)
    }

    fn save(&self, key: &SnapshotKey, snapshot: &InventorySnapshot) -> Result<(), StoreError> {
        let mut record = snapshot.clone();
        record.schema_version = SNAPSHOT_SCHEMA_VERSION;
        let payload = bincode::serialize(&record).map_err(StoreError::Encode)?;
        let envelope = RecordEnvelope {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            checksum: CRC32.checksum(&payload),
            payload,
        };
        let bytes = bincode::serialize(&envelope).map_err(StoreError::Encode)?;
        self.snapshots.insert(Self::storage_key(key), bytes)?;
        self.snapshots.flush()?;
        Ok(())
    }

    fn exists(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        Ok(self.snapshots.contains_key(Self::storage_key(key))?)
    }

    fn list_keys(
        &self,
        predicate: &dyn Fn(&SnapshotKey) -> bool,
    ) -> Result<Vec<SnapshotKey>, StoreError> {
        let mut keys = Vec::new();
        for entry in self.snapshots.scan_prefix(KEY_PREFIX.as_bytes()) {
            let (raw, _) = entry?;
            let text = String::from_utf8_lossy(&raw);
            let Some(encoded) = text.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            match SnapshotKey::parse(encoded) {
                Some(key) => {
                    if predicate(&key) {
                        keys.push(key);
                    }
                }
                None => {
                    log::warn!("skipping unparseable snapshot key: {}", text);
                }
            }
        }
        Ok(keys)
    }
}
